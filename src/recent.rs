use std::rc::Rc;
use tracing::{error, warn};

use crate::store::Store;

pub const RECENT_STORAGE_KEY: &str = "recent_urls";
pub const MAX_RECENT_URLS: usize = 10;

/// Most-recent-first list of routed URLs, without duplicates.
pub struct RecentUrls {
    urls: Vec<String>,
    store: Rc<dyn Store>,
}

impl RecentUrls {
    pub fn load(store: Rc<dyn Store>) -> Self {
        let urls = match store.get(RECENT_STORAGE_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                warn!(action = "parse", component = "recent_urls", error = %e, "Discarding malformed recent URL list");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(action = "load", component = "recent_urls", error = %e, "Failed to load recent URLs");
                Vec::new()
            }
        };
        Self { urls, store }
    }

    pub fn push(&mut self, url: &str) {
        self.urls.retain(|existing| existing != url);
        self.urls.insert(0, url.to_string());
        self.urls.truncate(MAX_RECENT_URLS);

        let result = serde_json::to_string(&self.urls)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(RECENT_STORAGE_KEY, &json));
        if let Err(e) = result {
            error!(action = "save", component = "recent_urls", error = %e, "Failed to save recent URLs");
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn push_dedupes_and_caps() {
        let store = Rc::new(MemoryStore::new());
        let mut recent = RecentUrls::load(store.clone());
        for i in 0..12 {
            recent.push(&format!("https://a.com/{}", i));
        }
        recent.push("https://a.com/5");

        let urls = recent.urls();
        assert_eq!(urls.len(), MAX_RECENT_URLS);
        assert_eq!(urls[0], "https://a.com/5");
        assert_eq!(urls[1], "https://a.com/11");
        assert_eq!(urls.iter().filter(|u| *u == "https://a.com/5").count(), 1);

        let reloaded = RecentUrls::load(store);
        assert_eq!(reloaded.urls(), urls);
    }

    #[test]
    fn malformed_snapshot_is_empty() {
        let store = Rc::new(MemoryStore::new());
        store.set(RECENT_STORAGE_KEY, "{}").unwrap();
        assert!(RecentUrls::load(store).urls().is_empty());
    }
}
