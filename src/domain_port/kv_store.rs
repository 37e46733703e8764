/// Durable key-value storage shared by every client instance on the machine.
///
/// Writes are last-writer-wins. The multi-key operations are used for values
/// that must appear and disappear together; implementations backed by a
/// shared store override them so each one is a single atomic step.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvStoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), KvStoreError>;
    async fn delete(&self, key: &str) -> Result<(), KvStoreError>;

    /// Values for `keys`, in order, read as one snapshot.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, KvStoreError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), KvStoreError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<(), KvStoreError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Deletes `keys` only while `guard_key` still holds `expected`.
    /// Returns whether anything was deleted.
    async fn delete_many_if(
        &self,
        keys: &[&str],
        guard_key: &str,
        expected: &str,
    ) -> Result<bool, KvStoreError> {
        if self.get(guard_key).await?.as_deref() != Some(expected) {
            return Ok(false);
        }
        self.delete_many(keys).await?;
        Ok(true)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KvStoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Store(String),
}
