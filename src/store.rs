use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;

/// Durable string key/value storage shared by the trackers.
///
/// Every snapshot is written wholesale under a single key, so implementations
/// only need whole-value reads, writes and deletes.
pub trait Store {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, used by tests and `--store :memory:`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Store whose writes always fail, for exercising the write-failure path.
    #[derive(Debug, Default)]
    pub(crate) struct ReadOnlyStore {
        pub(crate) inner: MemoryStore,
    }

    impl Store for ReadOnlyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("store is read-only")
        }

        fn remove(&self, _key: &str) -> Result<()> {
            anyhow::bail!("store is read-only")
        }
    }

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert!(store.contains("k"));

        store.remove("k").unwrap();
        assert!(!store.contains("k"));
        // Removing a missing key is not an error
        store.remove("k").unwrap();
    }
}
