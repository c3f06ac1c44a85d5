//! Session context: the single source of truth for "who is logged in"
//!
//! ```text
//! Bootstrapping --init--> Authenticated | Anonymous
//! Anonymous     --login-> Authenticated
//! Authenticated --logout / unrecoverable 401--> Anonymous
//! ```
//!
//! The session is an ordinary value. Independent sessions (each with its
//! own store) can live side by side.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use super::{
    api::ApiClient,
    refresh::RefreshCoordinator,
    transport::{ApiRequest, Transport},
};
use crate::{
    error::{ClientError, ClientResult},
    models::{
        user::{LoginRequest, RegisteredUser},
        CredentialPair, RegisterRequest, UserProfile,
    },
    storage::{CredentialStore, Credentials},
};

pub const LOGIN_PATH: &str = "auth/login/";
pub const ME_PATH: &str = "auth/me/";
pub const REGISTER_PATH: &str = "auth/register/";

/// Observable session value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Bootstrapping,
    Authenticated,
    Anonymous,
}

impl SessionSnapshot {
    pub fn bootstrapping() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }

    pub fn authenticated(user: UserProfile) -> Self {
        Self {
            user: Some(user),
            loading: false,
        }
    }

    /// A cached profile restored during bootstrap already counts as
    /// authenticated, even before verification completes.
    pub fn phase(&self) -> SessionPhase {
        match (&self.user, self.loading) {
            (Some(_), _) => SessionPhase::Authenticated,
            (None, true) => SessionPhase::Bootstrapping,
            (None, false) => SessionPhase::Anonymous,
        }
    }
}

/// Shared, observable session value.
///
/// Writers are the [`Session`] and, for ending the session only, the
/// request pipeline.
#[derive(Clone)]
pub struct SessionState {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::bootstrapping());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn set_user(&self, user: Option<UserProfile>) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.user == user {
                return false;
            }
            snapshot.user = user;
            true
        });
    }

    /// Drop the user. Returns whether someone was logged in.
    pub(crate) fn end(&self) -> bool {
        self.tx.send_if_modified(|snapshot| snapshot.user.take().is_some())
    }

    pub(crate) fn finish_loading(&self) {
        self.tx.send_if_modified(|snapshot| std::mem::replace(&mut snapshot.loading, false));
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(SessionSnapshot::bootstrapping());
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct Session {
    api: ApiClient,
    credentials: Credentials,
    refresher: RefreshCoordinator,
    state: SessionState,
    bootstrapped: Arc<Mutex<bool>>,
}

impl Session {
    /// Wire a session over a transport and a credential store. The session
    /// starts in `Bootstrapping`; call [`Session::init`] next.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        let credentials = Credentials::new(store);
        let refresher = RefreshCoordinator::new(transport.clone(), credentials.clone());
        let state = SessionState::new();
        let api = ApiClient::new(transport, credentials.clone(), refresher.clone(), state.clone());

        Self {
            api,
            credentials,
            refresher,
            state,
            bootstrapped: Arc::new(Mutex::new(false)),
        }
    }

    /// Authenticated request pipeline bound to this session
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.snapshot().phase()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.snapshot().user
    }

    /// Change notifications, for re-evaluating route guards
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Restore the stored session. Runs once; later calls return the
    /// current snapshot without touching the network.
    pub async fn init(&self) -> SessionSnapshot {
        let mut bootstrapped = self.bootstrapped.lock().await;
        if !*bootstrapped {
            self.bootstrap().await;
            *bootstrapped = true;
        }
        self.state.snapshot()
    }

    /// Detach from the in-memory state, keeping stored credentials. The
    /// session returns to `Bootstrapping` and a later `init` restores it.
    pub async fn teardown(&self) {
        let mut bootstrapped = self.bootstrapped.lock().await;
        *bootstrapped = false;
        self.state.reset();
        tracing::debug!("Session torn down");
    }

    async fn bootstrap(&self) {
        let user = self.credentials.user().await;
        let access = self.credentials.access_token().await;

        match (user, access) {
            (Ok(Some(user)), Ok(Some(_))) => {
                tracing::info!("Restoring stored session for {}", user.username);
                let generation = self.credentials.generation().await;
                self.state.set_user(Some(user));

                match self.fetch_profile().await {
                    Ok(profile) => match self.credentials.update_user(generation, &profile).await {
                        Ok(true) => self.state.set_user(Some(profile)),
                        Ok(false) => tracing::debug!("Session ended during verification"),
                        Err(e) => tracing::warn!("Failed to cache verified profile: {}", e),
                    },
                    Err(e) => {
                        tracing::warn!("Stored session is no longer valid: {}", e);
                        self.api.end_session(generation).await;
                    }
                }
            }
            (Ok(None), Ok(None)) => tracing::debug!("No stored session"),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Could not read stored credentials: {}", e);
            }
            _ => {
                tracing::info!("Discarding incomplete stored session");
                self.logout().await;
            }
        }

        self.state.finish_loading();
    }

    /// Log in with email and password, then load the canonical profile.
    ///
    /// Rejected credentials surface as `InvalidCredentials` and leave the
    /// session as it was.
    pub async fn login(&self, identifier: &str, secret: &str) -> ClientResult<UserProfile> {
        tracing::info!("Logging in as {}", identifier);

        let body = serde_json::to_value(LoginRequest {
            email: identifier.to_string(),
            password: secret.to_string(),
        })?;
        let response = self.api.send_public(ApiRequest::post(LOGIN_PATH, body)).await?;

        if matches!(response.status, 400 | 401) {
            let message = match ClientError::from_status(response.status, &response.body) {
                ClientError::Validation { message, .. } | ClientError::Api { message, .. } => message,
                other => other.to_string(),
            };
            tracing::info!("Login rejected: {}", message);
            return Err(ClientError::InvalidCredentials(message));
        }

        let pair: CredentialPair = response.into_result()?.json()?;
        let generation = self.credentials.replace_pair(&pair).await?;

        let user = match self.fetch_profile().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Login succeeded but profile could not be loaded: {}", e);
                self.api.end_session(generation).await;
                return Err(e);
            }
        };

        if !self.credentials.update_user(generation, &user).await? {
            return Err(ClientError::SessionExpired);
        }

        self.state.set_user(Some(user.clone()));
        self.state.finish_loading();
        tracing::info!("Logged in as {} ({})", user.username, user.role);

        Ok(user)
    }

    /// Create a member account. Does not log in.
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<RegisteredUser> {
        tracing::info!("Registering {}", request.email);

        let body = serde_json::to_value(request)?;
        let response = self.api.send_public(ApiRequest::post(REGISTER_PATH, body)).await?;
        response.into_result()?.json()
    }

    /// Forget the current identity. Idempotent and never fails: storage
    /// errors are logged and the in-memory session still ends.
    pub async fn logout(&self) {
        if let Err(e) = self.credentials.clear().await {
            tracing::warn!("Failed to clear stored credentials: {}", e);
        }
        if self.state.end() {
            tracing::info!("Logged out");
        }
    }

    /// Refresh the token pair explicitly. A failed refresh logs out, unless
    /// a new login replaced the session in the meantime.
    pub async fn refresh_token(&self) -> ClientResult<CredentialPair> {
        let generation = self.credentials.generation().await;
        match self.refresher.refresh_at(generation).await {
            Ok(pair) => Ok(pair),
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                if self.api.end_session(generation).await {
                    tracing::info!("Logged out");
                }
                Err(e)
            }
        }
    }

    async fn fetch_profile(&self) -> ClientResult<UserProfile> {
        self.api.get_json(ME_PATH).await
    }
}
