use crate::domain_port::*;
use dashmap::DashMap;
use std::sync::{PoisonError, RwLock};

/// Process-local store. Durable only for the life of the process; shared
/// between every component holding the same `Arc`.
///
/// Single-key operations share the batch lock; multi-key writes take it
/// exclusively, so a `get_many` never observes half of a `set_many`.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, String>,
    batch: RwLock<()>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvStoreError> {
        let _shared = self.batch.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvStoreError> {
        let _shared = self.batch.read().unwrap_or_else(PoisonError::into_inner);
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvStoreError> {
        let _shared = self.batch.read().unwrap_or_else(PoisonError::into_inner);
        self.entries.remove(key);
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, KvStoreError> {
        let _exclusive = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .iter()
            .map(|key| self.entries.get(*key).map(|v| v.value().clone()))
            .collect())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), KvStoreError> {
        let _exclusive = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            self.entries.insert((*key).to_owned(), value.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<(), KvStoreError> {
        let _exclusive = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }

    async fn delete_many_if(
        &self,
        keys: &[&str],
        guard_key: &str,
        expected: &str,
    ) -> Result<bool, KvStoreError> {
        let _exclusive = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        let matches = self
            .entries
            .get(guard_key)
            .is_some_and(|v| v.value().as_str() == expected);
        if matches {
            for key in keys {
                self.entries.remove(*key);
            }
        }
        Ok(matches)
    }
}
