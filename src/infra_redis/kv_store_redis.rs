use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
const DELETE_IF_GUARD: &str = include_str!("delete_if_guard.lua");

/// Durable store shared by every client process pointed at the same Redis.
pub struct RedisKvStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisKvStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisKvStore {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(dsn: &str, prefix: impl Into<String>) -> Result<Self, KvStoreError> {
        let client =
            redis::Client::open(dsn).map_err(|e| KvStoreError::Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KvStoreError::Unavailable(e.to_string()))?;
        Ok(Self::new(conn, prefix))
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvStoreError> {
        let mut conn = self.conn.clone();
        let val: Option<String> = conn
            .get(self.key(key))
            .await
            .map_err(|e| KvStoreError::Store(e.to_string()))?;
        Ok(val)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.key(key), value)
            .await
            .map_err(|e| KvStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.key(key))
            .await
            .map_err(|e| KvStoreError::Store(e.to_string()))?;
        Ok(())
    }

    // MGET is a single command, so it cannot interleave with a MULTI/EXEC write.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, KvStoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut conn = self.conn.clone();
        redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvStoreError::Store(e.to_string()))
    }

    // MULTI/EXEC: paired with `get_many`, readers never see half a record.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), KvStoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.set(self.key(key), value).ignore();
        }
        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| KvStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<(), KvStoreError> {
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(keys)
            .await
            .map_err(|e| KvStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete_many_if(
        &self,
        keys: &[&str],
        guard_key: &str,
        expected: &str,
    ) -> Result<bool, KvStoreError> {
        let script = Script::new(DELETE_IF_GUARD);
        let mut invocation = script.prepare_invoke();
        invocation.key(self.key(guard_key));
        for key in keys {
            invocation.key(self.key(key));
        }
        invocation.arg(expected);

        let mut conn = self.conn.clone();
        let deleted: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| KvStoreError::Store(e.to_string()))?;
        Ok(deleted == 1)
    }
}
