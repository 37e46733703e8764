use crate::application_port::RefreshError;
use crate::domain_model::Credential;
use crate::domain_port::{KvStore, KvStoreError};
use crate::logger::*;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const CREDENTIAL_KEY: &str = "auth_token";

type PendingRefresh = Shared<BoxFuture<'static, Result<Credential, RefreshError>>>;

struct InflightRefresh {
    generation: u64,
    pending: PendingRefresh,
}

/// The logged-in session: the credential held in durable storage plus the
/// single refresh that may be in flight for it.
///
/// The credential is read from the store on every use, so other client
/// instances sharing the store see logins, refreshes and logouts.
pub struct Session {
    store: Arc<dyn KvStore>,
    inflight: Mutex<Option<InflightRefresh>>,
    generation: AtomicU64,
}

impl Session {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            inflight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Current credential. A store that cannot be read counts as logged out.
    pub async fn credential(&self) -> Option<Credential> {
        match self.store.get(CREDENTIAL_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()).map(Credential::new),
            Err(e) => {
                warn!(error = %e, "credential lookup failed");
                None
            }
        }
    }

    pub async fn login(&self, credential: &Credential) -> Result<(), KvStoreError> {
        self.store.set(CREDENTIAL_KEY, credential.as_str()).await?;
        info!("session credential stored");
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), KvStoreError> {
        self.store.delete(CREDENTIAL_KEY).await?;
        info!("session credential cleared");
        Ok(())
    }

    /// Number of refreshes started so far.
    pub fn refresh_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Joins the refresh already in flight, or starts one with `start`.
    ///
    /// Every caller that overlaps a refresh receives that refresh's result;
    /// `start` runs only when no refresh is pending.
    pub async fn single_flight<F>(&self, start: F) -> Result<Credential, RefreshError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Credential, RefreshError>>,
    {
        let (generation, pending) = {
            let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(inflight) => {
                    debug!(generation = inflight.generation, "joining in-flight refresh");
                    (inflight.generation, inflight.pending.clone())
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = start().shared();
                    *slot = Some(InflightRefresh {
                        generation,
                        pending: pending.clone(),
                    });
                    (generation, pending)
                }
            }
        };

        let result = pending.await;

        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|i| i.generation == generation) {
            *slot = None;
        }
        result
    }
}
