//! Authenticated request pipeline
//!
//! Every business call goes through [`ApiClient::request`]: the stored access
//! token is attached, and a 401 is recovered at most once by refreshing the
//! token and re-issuing the call. Every other status passes through.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{
    refresh::RefreshCoordinator,
    session::SessionState,
    transport::{ApiRequest, ApiResponse, Method, Transport},
};
use crate::{
    error::{ClientError, ClientResult},
    storage::Credentials,
};

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    refresher: RefreshCoordinator,
    state: SessionState,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        refresher: RefreshCoordinator,
        state: SessionState,
    ) -> Self {
        Self {
            transport,
            credentials,
            refresher,
            state,
        }
    }

    /// Issue an authenticated call, recovering once from an expired token.
    ///
    /// Returns `SessionExpired` when the token cannot be refreshed (the
    /// session is logged out first) or when the call is still rejected after
    /// a successful refresh.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ClientResult<ApiResponse> {
        self.execute(ApiRequest::new(method, path).with_body(body)).await
    }

    /// Same as [`request`](Self::request) for a prepared request, e.g. one
    /// carrying query parameters. Any bearer already set is replaced.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let (generation, sent_token) = self.credentials.access_token_at().await?;
        let response = self
            .transport
            .send(request.clone().with_bearer(sent_token.clone()))
            .await?;

        if !response.is_unauthorized() {
            return response.into_result();
        }

        tracing::debug!("Authorization failure on {}, recovering", request.path);

        let (current_generation, current) = self.credentials.access_token_at().await?;
        if current_generation != generation {
            // Logged out or replaced by another login meanwhile
            tracing::debug!("Session changed while {} was in flight", request.path);
            return Err(ClientError::SessionExpired);
        }

        let token = match current {
            // Another call already refreshed while this one was in flight
            Some(current) if sent_token.as_ref() != Some(&current) => current,
            _ => match self.refresher.refresh_at(generation).await {
                Ok(pair) => pair.access,
                Err(e) => {
                    tracing::warn!("Session recovery failed: {}", e);
                    self.end_session(generation).await;
                    return Err(ClientError::SessionExpired);
                }
            },
        };

        let path = request.path.clone();
        let retried = self.transport.send(request.with_bearer(Some(token))).await?;
        if retried.is_unauthorized() {
            tracing::warn!("Still unauthorized on {} after refresh, giving up", path);
            return Err(ClientError::SessionExpired);
        }

        retried.into_result()
    }

    /// Send a call that carries no credentials and is never retried (login,
    /// registration). The raw response is returned whatever its status.
    pub async fn send_public(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.transport.send(request.with_bearer(None)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(Method::GET, path, None).await?.json()
    }

    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> ClientResult<T> {
        self.execute(ApiRequest::get(path).with_query(query)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body)).await?.json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body)).await?.json()
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.request(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// End the session that `generation` belongs to. A newer login is kept.
    /// Returns whether the session was ended.
    pub(crate) async fn end_session(&self, generation: u64) -> bool {
        match self.credentials.clear_if(generation).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Session already replaced, keeping it");
                return false;
            }
            Err(e) => tracing::warn!("Failed to clear stored credentials: {}", e),
        }
        self.state.end();
        true
    }
}
