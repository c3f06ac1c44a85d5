//! Token refresh coordination
//!
//! At most one refresh is in flight per session. Callers arriving while one
//! is pending await the same shared future and receive the same outcome, so
//! a refresh token is never spent twice by racing requests.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use super::transport::{ApiRequest, Transport};
use crate::{
    error::{ClientError, ClientResult},
    models::{
        token::{RefreshRequest, RefreshResponse},
        CredentialPair,
    },
    storage::Credentials,
};

pub const REFRESH_PATH: &str = "auth/refresh/";

type PendingRefresh = Shared<BoxFuture<'static, ClientResult<CredentialPair>>>;

struct Inner {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    pending: Mutex<Option<(u64, PendingRefresh)>>,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Joins the refresh already in flight if there is one. Errors:
    /// `NoRefreshToken` when nothing is stored (no network call is made),
    /// `RefreshRejected` on rejection or network failure, `SessionExpired`
    /// when the session was logged out while the refresh was in flight.
    pub async fn refresh(&self) -> ClientResult<CredentialPair> {
        let generation = self.inner.credentials.generation().await;
        self.refresh_at(generation).await
    }

    /// Refresh on behalf of the session `generation`. Fails with
    /// `SessionExpired`, without a network call, once that session is gone.
    pub async fn refresh_at(&self, generation: u64) -> ClientResult<CredentialPair> {
        let pending = {
            let mut slot = self.inner.pending.lock().await;
            if self.inner.credentials.generation().await != generation {
                return Err(ClientError::SessionExpired);
            }
            match slot.as_ref() {
                Some((started, pending)) if *started == generation => {
                    tracing::debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                _ => {
                    // A refresh left over from an ended identity is not joined
                    let inner = Arc::clone(&self.inner);
                    let pending = async move {
                        let result = inner.exchange(generation).await;
                        // Settled: the next caller starts a fresh refresh
                        let mut slot = inner.pending.lock().await;
                        if matches!(slot.as_ref(), Some((started, _)) if *started == generation) {
                            *slot = None;
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some((generation, pending.clone()));
                    pending
                }
            }
        };

        pending.await
    }

    /// Whether a refresh is currently in flight
    pub async fn is_pending(&self) -> bool {
        self.inner.pending.lock().await.is_some()
    }
}

impl Inner {
    async fn exchange(&self, generation: u64) -> ClientResult<CredentialPair> {
        let (current, refresh) = self.credentials.refresh_token_at().await?;
        if current != generation {
            tracing::debug!("Session changed before refreshing, nothing to do");
            return Err(ClientError::SessionExpired);
        }
        let Some(refresh) = refresh else {
            tracing::info!("No refresh token stored, cannot refresh session");
            return Err(ClientError::NoRefreshToken);
        };

        tracing::info!("Refreshing access token");

        let body = serde_json::to_value(RefreshRequest { refresh: &refresh })?;
        let request = ApiRequest::post(REFRESH_PATH, body);
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::RefreshRejected(e.to_string()))?;

        if !response.is_success() {
            tracing::warn!("Refresh token rejected with status {}", response.status);
            return Err(ClientError::RefreshRejected(
                ClientError::from_status(response.status, &response.body).to_string(),
            ));
        }

        let pair = response
            .json::<RefreshResponse>()
            .map_err(|e| ClientError::RefreshRejected(e.to_string()))?
            .into_pair(&refresh);

        if !self.credentials.update_pair(generation, &pair).await? {
            tracing::info!("Session ended while refreshing, discarding new tokens");
            return Err(ClientError::SessionExpired);
        }

        tracing::info!("Access token refreshed");
        Ok(pair)
    }
}
