//! Outcome analytics for bypass attempts.
//!
//! Aggregates per-service and per-domain counters and recommends a service
//! for a domain once enough outcomes have been observed. Domain success
//! rates are stored as rounded percentages and updated incrementally from
//! the implied success count.

use std::rc::Rc;
use tracing::{debug, error, info, warn};

use crate::stats::{AnalyticsState, DomainStat, ServiceStat};
use crate::store::Store;

pub const ANALYTICS_STORAGE_KEY: &str = "bypass_analytics";

/// Observations required before a domain's best service overrides the default.
pub const MIN_ATTEMPTS_FOR_RECOMMENDATION: u64 = 3;

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        return 0.0;
    }
    rate.clamp(0.0, 100.0)
}

fn round_one_decimal(rate: f64) -> f64 {
    (rate * 10.0).round() / 10.0
}

pub struct AnalyticsTracker {
    state: AnalyticsState,
    store: Rc<dyn Store>,
}

impl std::fmt::Debug for AnalyticsTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsTracker")
            .field("total_attempts", &self.state.total_attempts)
            .field("domains", &self.state.domain_stats.len())
            .finish()
    }
}

impl AnalyticsTracker {
    /// Load the persisted snapshot, falling back to the default state when it
    /// is missing, unreadable or malformed.
    pub fn load(store: Rc<dyn Store>) -> Self {
        let state = match store.get(ANALYTICS_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<AnalyticsState>(&raw) {
                Ok(mut state) => {
                    repair(&mut state);
                    info!(
                        action = "loaded",
                        component = "analytics",
                        total_attempts = state.total_attempts,
                        domain_count = state.domain_stats.len(),
                        "Loaded analytics snapshot"
                    );
                    state
                }
                Err(e) => {
                    warn!(action = "parse", component = "analytics", error = %e, "Discarding malformed analytics snapshot");
                    AnalyticsState::default()
                }
            },
            Ok(None) => AnalyticsState::default(),
            Err(e) => {
                error!(action = "load", component = "analytics", error = %e, "Failed to load analytics from store");
                AnalyticsState::default()
            }
        };

        Self { state, store }
    }

    pub fn state(&self) -> &AnalyticsState {
        &self.state
    }

    pub fn record_attempt(&mut self, domain: &str, service: &str) {
        self.state.total_attempts += 1;

        self.state
            .service_stats
            .entry(service.to_string())
            .or_default()
            .attempts += 1;

        self.state
            .domain_stats
            .entry(domain.to_string())
            .or_insert_with(|| DomainStat {
                attempts: 0,
                best_service: service.to_string(),
                success_rate: 0.0,
            })
            .attempts += 1;

        debug!(action = "attempt", component = "analytics", domain, service, "Recorded attempt");
        self.persist();
    }

    pub fn record_success(&mut self, domain: &str, service: &str) {
        self.state
            .service_stats
            .entry(service.to_string())
            .and_modify(|stat| stat.successes += 1)
            .or_insert(ServiceStat {
                attempts: 1,
                successes: 1,
                failures: 0,
            });

        match self.state.domain_stats.get_mut(domain) {
            None => {
                self.state.domain_stats.insert(
                    domain.to_string(),
                    DomainStat {
                        attempts: 1,
                        best_service: service.to_string(),
                        success_rate: 100.0,
                    },
                );
            }
            Some(stat) => {
                let attempts = stat.attempts as f64;
                stat.success_rate = if stat.attempts == 0 {
                    100.0
                } else {
                    // Implied whole number of prior successes.
                    let prior = (stat.success_rate / 100.0 * attempts).round().min(attempts);
                    clamp_rate(round_one_decimal((prior + 1.0) / attempts * 100.0))
                };

                // Ties keep the incumbent.
                let acting_rate = rate_of(&self.state.service_stats, service);
                let incumbent_rate = rate_of(&self.state.service_stats, &stat.best_service);
                if acting_rate > incumbent_rate {
                    info!(
                        action = "promote",
                        component = "analytics",
                        domain,
                        previous = %stat.best_service,
                        service,
                        "Best service changed"
                    );
                    stat.best_service = service.to_string();
                }
            }
        }

        debug!(action = "success", component = "analytics", domain, service, "Recorded success");
        self.persist();
    }

    pub fn record_failure(&mut self, domain: &str, service: &str) {
        self.state
            .service_stats
            .entry(service.to_string())
            .and_modify(|stat| stat.failures += 1)
            .or_insert(ServiceStat {
                attempts: 1,
                successes: 0,
                failures: 1,
            });

        match self.state.domain_stats.get_mut(domain) {
            None => {
                self.state.domain_stats.insert(
                    domain.to_string(),
                    DomainStat {
                        attempts: 1,
                        best_service: service.to_string(),
                        success_rate: 0.0,
                    },
                );
            }
            Some(stat) => {
                let attempts = stat.attempts as f64;
                stat.success_rate = if stat.attempts == 0 {
                    0.0
                } else {
                    // A failure means at least one recorded attempt did not succeed.
                    let count = (stat.success_rate / 100.0 * attempts)
                        .round()
                        .min(attempts - 1.0)
                        .max(0.0);
                    clamp_rate(round_one_decimal(count / attempts * 100.0))
                };
            }
        }

        debug!(action = "failure", component = "analytics", domain, service, "Recorded failure");
        self.persist();
    }

    pub fn recommended_service<'a>(&'a self, domain: &str, default_service: &'a str) -> &'a str {
        match self.state.domain_stats.get(domain) {
            Some(stat) if stat.attempts >= MIN_ATTEMPTS_FOR_RECOMMENDATION => {
                stat.best_service.as_str()
            }
            _ => default_service,
        }
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.state)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(ANALYTICS_STORAGE_KEY, &json));
        if let Err(e) = result {
            error!(action = "save", component = "analytics", error = %e, "Failed to save analytics to store");
        }
    }
}

fn rate_of(stats: &std::collections::BTreeMap<String, ServiceStat>, service: &str) -> f64 {
    stats.get(service).map(ServiceStat::success_rate).unwrap_or(0.0)
}

fn repair(state: &mut AnalyticsState) {
    for (domain, stat) in state.domain_stats.iter_mut() {
        let clamped = clamp_rate(stat.success_rate);
        if clamped != stat.success_rate {
            warn!(
                action = "repair",
                component = "analytics",
                domain = %domain,
                stored = stat.success_rate,
                clamped,
                "Clamped out-of-range success rate"
            );
            stat.success_rate = clamped;
        }
    }
}
