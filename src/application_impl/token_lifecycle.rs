use crate::application_impl::Session;
use crate::application_port::{CredentialRefresher, FreshCredential, RefreshFailed};
use crate::domain_model::Credential;
use crate::domain_port::Clock;
use crate::logger::*;
use chrono::Duration;
use futures_util::FutureExt;
use std::sync::Arc;

pub const DEFAULT_GRACE_SECS: i64 = 30;

pub struct TokenLifecycleManager {
    session: Arc<Session>,
    refresher: Arc<dyn CredentialRefresher>,
    clock: Arc<dyn Clock>,
    grace: Duration,
}

impl TokenLifecycleManager {
    pub fn new(
        session: Arc<Session>,
        refresher: Arc<dyn CredentialRefresher>,
        clock: Arc<dyn Clock>,
        grace: Duration,
    ) -> Self {
        Self {
            session,
            refresher,
            clock,
            grace,
        }
    }

    /// True once `now` is past `expiry - grace`. Undecodable tokens are
    /// used as-is; a bad one comes back as a 401 and takes the retry path.
    pub fn needs_refresh(&self, credential: &Credential) -> bool {
        match credential.expires_at() {
            Some(expires_at) => self.clock.now() > expires_at - self.grace,
            None => false,
        }
    }

    pub async fn ensure_fresh(
        &self,
        credential: Credential,
    ) -> Result<FreshCredential, RefreshFailed> {
        if !self.needs_refresh(&credential) {
            return Ok(FreshCredential {
                credential,
                refreshed: false,
            });
        }

        debug!(expires_at = ?credential.expires_at(), "credential inside grace window");
        let credential = self.refresh(&credential).await?;
        Ok(FreshCredential {
            credential,
            refreshed: true,
        })
    }

    /// Refreshes `stale`, sharing the work with any refresh already running.
    ///
    /// Success persists the new credential. Failure logs the session out;
    /// it is never retried here.
    pub async fn refresh(&self, stale: &Credential) -> Result<Credential, RefreshFailed> {
        let refresher = self.refresher.clone();
        let session = self.session.clone();
        let stale = stale.clone();

        self.session
            .single_flight(move || {
                async move {
                    info!("refreshing credential");
                    match refresher.refresh(&stale).await {
                        Ok(fresh) => {
                            if let Err(e) = session.login(&fresh).await {
                                warn!(error = %e, "refreshed credential not persisted");
                            }
                            Ok(fresh)
                        }
                        Err(e) => {
                            warn!(error = %e, "credential refresh failed, logging out");
                            if let Err(store_err) = session.logout().await {
                                warn!(
                                    error = %store_err,
                                    "credential not cleared after failed refresh"
                                );
                            }
                            Err(e)
                        }
                    }
                }
                .boxed()
            })
            .await
            .map_err(RefreshFailed)
    }
}
