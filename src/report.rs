use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, CACHE_TTL_MS};
use crate::router::{RouteDecision, RouteSource};
use crate::services::service_name;
use crate::stats::AnalyticsState;
use crate::utils::{format_number, redact_domain};

pub fn print_route(decision: &RouteDecision) {
    match decision.source {
        RouteSource::Default => println!(
            "{}: {}",
            decision.target.service_name, decision.target.redirect_url
        ),
        source => println!(
            "{} ({}): {}",
            decision.target.service_name, source, decision.target.redirect_url
        ),
    }
}

pub fn print_feedback(url: &str, service: &str, entry: Option<&CacheEntry>) {
    let verdict = match entry {
        Some(entry) if entry.successful => "worked",
        Some(_) => "did not work",
        None => "recorded",
    };
    println!("{} {} for {}", service_name(service), verdict, url);

    if let Some(entry) = entry {
        if let Some(at) = DateTime::<Utc>::from_timestamp_millis(entry.timestamp) {
            println!("Cached until {}", (at + chrono::Duration::milliseconds(CACHE_TTL_MS)).format("%B %-d, %Y"));
        }
    }
}

pub fn print_recent(urls: &[String]) {
    if urls.is_empty() {
        println!("No recent URLs");
        return;
    }
    for (i, url) in urls.iter().enumerate() {
        println!("{:>2}. {}", i + 1, url);
    }
}

pub fn print_stats(state: &AnalyticsState, top: usize, redact: bool) {
    println!("\n--- Overall Statistics ---");
    println!("Total attempts: {}", format_number(state.total_attempts));
    println!("Successful bypasses: {}", format_number(state.total_successes()));
    println!("Success rate: {}%", state.overall_success_rate());

    println!("\n--- Service Performance ---");
    for (service, stat) in &state.service_stats {
        println!(
            "- {}: {} attempts, {} successes, {}%",
            service_name(service),
            format_number(stat.attempts),
            format_number(stat.successes),
            stat.display_rate()
        );
    }

    let top_domains = state.top_domains(top);
    if top_domains.is_empty() {
        println!("\nNo publications recorded yet");
        return;
    }

    println!("\n--- Top {} Publications ---", top_domains.len());
    for (domain, stat) in top_domains {
        let display_domain = if redact {
            redact_domain(domain)
        } else {
            domain.to_string()
        };
        println!(
            "- {}: {} attempts, best {}, {:.1}% success",
            display_domain,
            format_number(stat.attempts),
            service_name(&stat.best_service),
            stat.success_rate
        );
    }
}
