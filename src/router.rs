//! Routing session: ties the service map, the result cache and the
//! analytics tracker together for one run of the tool.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::{error, info};

use crate::analytics::AnalyticsTracker;
use crate::cache::{CacheEntry, Clock, ResultCache};
use crate::domain::{domain_of, format_url};
use crate::recent::RecentUrls;
use crate::services::{BypassTarget, ServiceMap};
use crate::stats::AnalyticsState;
use crate::store::Store;

pub const LAST_ROUTE_STORAGE_KEY: &str = "last_route";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Cached,
    Recommended,
    Default,
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSource::Cached => write!(f, "cached"),
            RouteSource::Recommended => write!(f, "recommended"),
            RouteSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub url: String,
    pub domain: String,
    pub target: BypassTarget,
    pub source: RouteSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LastRoute {
    url: String,
    service: String,
}

pub struct Session {
    services: ServiceMap,
    analytics: AnalyticsTracker,
    cache: ResultCache,
    recent: RecentUrls,
    store: Rc<dyn Store>,
}

impl Session {
    pub fn new(services: ServiceMap, store: Rc<dyn Store>, clock: Rc<dyn Clock>) -> Self {
        Self {
            services,
            analytics: AnalyticsTracker::load(store.clone()),
            cache: ResultCache::load(store.clone(), clock),
            recent: RecentUrls::load(store.clone()),
            store,
        }
    }

    pub fn route(&mut self, input: &str) -> Result<RouteDecision> {
        let url = format_url(input);
        let domain = domain_of(&url).context("Please enter a valid URL")?;

        let (target, source) = match self.cache.cached_service(&url) {
            Some(cached) if cached.successful => {
                (BypassTarget::new(&url, &cached.service), RouteSource::Cached)
            }
            _ => {
                let default = self.services.lookup_default(&url);
                let recommended = self
                    .analytics
                    .recommended_service(&domain, &default.service_id)
                    .to_string();
                if recommended != default.service_id {
                    (BypassTarget::new(&url, &recommended), RouteSource::Recommended)
                } else {
                    (default, RouteSource::Default)
                }
            }
        };

        info!(
            action = "route",
            component = "session",
            domain = %domain,
            service = %target.service_id,
            source = %source,
            "Routed URL"
        );

        self.analytics.record_attempt(&domain, &target.service_id);
        self.recent.push(&url);
        self.remember_last_route(&url, &target.service_id);

        Ok(RouteDecision {
            url,
            domain,
            target,
            source,
        })
    }

    /// Record the user's verdict on a routed URL. Without an explicit
    /// service, the service from the last `route` of the same URL is used.
    pub fn feedback(&mut self, input: &str, outcome: Outcome, service: Option<&str>) -> Result<String> {
        let url = format_url(input);
        let domain = domain_of(&url).context("Please enter a valid URL")?;

        let service = match service {
            Some(service) => service.to_string(),
            None => match self.last_route() {
                Some(last) if last.url == url => last.service,
                _ => anyhow::bail!(
                    "no routed service to give feedback for {}; route it first or pass --service",
                    url
                ),
            },
        };

        match outcome {
            Outcome::Success => {
                self.analytics.record_success(&domain, &service);
                self.cache.cache_url(&url, &service, true);
            }
            Outcome::Failure => {
                self.analytics.record_failure(&domain, &service);
                self.cache.cache_url(&url, &service, false);
            }
        }

        info!(
            action = "feedback",
            component = "session",
            domain = %domain,
            service = %service,
            outcome = ?outcome,
            "Recorded feedback"
        );
        Ok(service)
    }

    pub fn clear_cache(&mut self) -> usize {
        let cleared = self.cache.len();
        self.cache.clear();
        cleared
    }

    pub fn analytics(&self) -> &AnalyticsState {
        self.analytics.state()
    }

    pub fn cache_entry(&self, url: &str) -> Option<&CacheEntry> {
        self.cache.entry(url)
    }

    pub fn recent(&self) -> &[String] {
        self.recent.urls()
    }

    fn last_route(&self) -> Option<LastRoute> {
        let raw = self.store.get(LAST_ROUTE_STORAGE_KEY).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    fn remember_last_route(&self, url: &str, service: &str) {
        let last = LastRoute {
            url: url.to_string(),
            service: service.to_string(),
        };
        let result = serde_json::to_string(&last)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(LAST_ROUTE_STORAGE_KEY, &json));
        if let Err(e) = result {
            error!(action = "save", component = "session", error = %e, "Failed to save last route");
        }
    }
}
