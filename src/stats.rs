use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::KNOWN_SERVICES;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStat {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl ServiceStat {
    /// Raw success percentage, capped at 100. Zero when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        (self.successes as f64 / self.attempts as f64 * 100.0).min(100.0)
    }

    /// Success percentage rounded to a whole number for display.
    pub fn display_rate(&self) -> u32 {
        self.success_rate().round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainStat {
    pub attempts: u64,
    pub best_service: String,
    /// Percentage in [0, 100], kept to one decimal place.
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsState {
    #[serde(default)]
    pub total_attempts: u64,
    #[serde(default)]
    pub service_stats: BTreeMap<String, ServiceStat>,
    #[serde(default)]
    pub domain_stats: BTreeMap<String, DomainStat>,
}

impl Default for AnalyticsState {
    fn default() -> Self {
        Self {
            total_attempts: 0,
            service_stats: KNOWN_SERVICES
                .iter()
                .map(|service| (service.id.to_string(), ServiceStat::default()))
                .collect(),
            domain_stats: BTreeMap::new(),
        }
    }
}

impl AnalyticsState {
    pub fn total_successes(&self) -> u64 {
        self.service_stats.values().map(|stat| stat.successes).sum()
    }

    pub fn overall_success_rate(&self) -> u32 {
        if self.total_attempts == 0 {
            return 0;
        }
        let rate = self.total_successes() as f64 / self.total_attempts as f64 * 100.0;
        rate.round().min(100.0) as u32
    }

    /// Domains with the most attempts first; equal counts sort by name.
    pub fn top_domains(&self, limit: usize) -> Vec<(&String, &DomainStat)> {
        let mut domains: Vec<(&String, &DomainStat)> = self.domain_stats.iter().collect();
        domains.sort_by(|a, b| b.1.attempts.cmp(&a.1.attempts).then_with(|| a.0.cmp(b.0)));
        domains.truncate(limit);
        domains
    }
}
