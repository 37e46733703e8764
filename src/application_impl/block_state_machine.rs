use crate::domain_model::{BlockRecord, BlockState, BlockVerdict, Destination, Enforcement};
use crate::domain_port::{Clock, KvStore, KvStoreError, Navigator};
use crate::logger::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const BLOCK_EXPIRES_AT_KEY: &str = "waf_block_expires_at";
pub const BLOCK_RULE_KEY: &str = "waf_block_rule";
pub const BLOCK_DURATION_KEY: &str = "waf_block_duration_minutes";

const BLOCK_KEYS: [&str; 3] = [BLOCK_EXPIRES_AT_KEY, BLOCK_RULE_KEY, BLOCK_DURATION_KEY];

#[derive(Debug, Clone)]
pub struct BlockPolicy {
    /// Remaining time at or below which an active block is left to lapse
    /// instead of redirecting.
    pub redirect_floor: Duration,
    pub default_duration_minutes: u32,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            redirect_floor: Duration::seconds(5),
            default_duration_minutes: 15,
        }
    }
}

/// Clear/Blocked state persisted in the durable store.
///
/// Blocked only ever becomes Clear by expiry, purged lazily when read.
/// There is no operation to lift a block early.
pub struct BlockStateMachine {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    policy: BlockPolicy,
}

impl BlockStateMachine {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
        policy: BlockPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            navigator,
            policy,
        }
    }

    pub async fn state(&self) -> BlockState {
        let now = self.clock.now();
        self.state_at(now).await
    }

    /// Check run before page logic and before every outbound call.
    pub async fn enforce(&self) -> Enforcement {
        let now = self.clock.now();
        match self.state_at(now).await {
            BlockState::Clear => Enforcement::Proceed,
            BlockState::Blocked(record) if record.remaining(now) > self.policy.redirect_floor => {
                debug!(rule = %record.rule_id, "active block, redirecting");
                self.navigator.redirect(Destination::Blocked);
                Enforcement::Redirected(record)
            }
            BlockState::Blocked(record) => {
                debug!(rule = %record.rule_id, "block about to lapse, not redirecting");
                Enforcement::Lapsing(record)
            }
        }
    }

    pub fn verdict_in(&self, status: u16, body: &str) -> Option<BlockVerdict> {
        BlockVerdict::from_response(status, body, self.policy.default_duration_minutes)
    }

    /// Clear → Blocked. Persists the record and sends the client to the
    /// blocked destination.
    pub async fn record_verdict(&self, verdict: &BlockVerdict) -> BlockRecord {
        let record = BlockRecord::starting_at(self.clock.now(), verdict);
        let entries = [
            (
                BLOCK_EXPIRES_AT_KEY,
                record.expires_at.timestamp_millis().to_string(),
            ),
            (BLOCK_RULE_KEY, record.rule_id.clone()),
            (BLOCK_DURATION_KEY, record.duration_minutes.to_string()),
        ];
        if let Err(e) = self.store.set_many(&entries).await {
            error!(error = %e, "block record not persisted");
        }

        warn!(
            rule = %record.rule_id,
            minutes = record.duration_minutes,
            expires_at = %record.expires_at,
            "abuse detector verdict recorded"
        );
        self.navigator.redirect(Destination::Blocked);
        record
    }

    async fn state_at(&self, now: DateTime<Utc>) -> BlockState {
        match self.load().await {
            Ok(Some((record, _))) if record.remaining(now) > Duration::zero() => {
                BlockState::Blocked(record)
            }
            Ok(Some((record, stored_expiry))) => {
                info!(rule = %record.rule_id, "block expired, purging");
                self.purge(&stored_expiry).await;
                BlockState::Clear
            }
            Ok(None) => BlockState::Clear,
            Err(e) => {
                warn!(error = %e, "block record unreadable, treating as clear");
                BlockState::Clear
            }
        }
    }

    /// The stored record plus its raw expiry value, read in one snapshot.
    async fn load(&self) -> Result<Option<(BlockRecord, String)>, KvStoreError> {
        let mut values = self.store.get_many(&BLOCK_KEYS).await?.into_iter();
        let (expires_at, rule_id, duration) = (
            values.next().flatten(),
            values.next().flatten(),
            values.next().flatten(),
        );

        let (expires_at, rule_id, duration) = match (expires_at, rule_id, duration) {
            (None, None, None) => return Ok(None),
            (Some(e), Some(r), Some(d)) => (e, r, d),
            (Some(e), _, _) => {
                warn!("partial block record, purging");
                self.purge(&e).await;
                return Ok(None);
            }
            // Nothing to guard the delete on; the next verdict overwrites these.
            (None, _, _) => {
                warn!("block record without expiry, ignoring");
                return Ok(None);
            }
        };

        let parsed = expires_at
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .zip(duration.parse::<u32>().ok());
        match parsed {
            Some((at, duration_minutes)) => Ok(Some((
                BlockRecord {
                    expires_at: at,
                    rule_id,
                    duration_minutes,
                },
                expires_at,
            ))),
            None => {
                warn!("malformed block record, purging");
                self.purge(&expires_at).await;
                Ok(None)
            }
        }
    }

    /// Removes the record read with expiry `seen`, unless a newer verdict
    /// has replaced it since.
    async fn purge(&self, seen: &str) {
        match self
            .store
            .delete_many_if(&BLOCK_KEYS, BLOCK_EXPIRES_AT_KEY, seen)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!("block record replaced before purge, keeping it"),
            Err(e) => warn!(error = %e, "block record purge failed"),
        }
    }
}
