pub mod analytics;
pub mod args;
pub mod cache;
pub mod domain;
pub mod recent;
pub mod report;
pub mod router;
pub mod services;
pub mod sqlite;
pub mod stats;
pub mod store;
pub mod utils;

pub use analytics::AnalyticsTracker;
pub use args::Args;
pub use cache::{CachedService, Clock, ResultCache, SystemClock};
pub use router::{Outcome, RouteDecision, RouteSource, Session};
pub use services::{init_default_service_map, BypassTarget, ServiceMap};
pub use stats::{AnalyticsState, DomainStat, ServiceStat};
pub use store::{MemoryStore, Store};
