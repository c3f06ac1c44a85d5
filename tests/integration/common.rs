//! In-process stand-in for the BookHub API
//!
//! Issues `A{n}`/`R{n}` tokens, validates bearers, rotates refresh tokens and
//! counts calls per path. Refresh answers are delayed so that concurrent
//! callers overlap.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use bookhub_client::{
    error::ClientResult,
    services::transport::{ApiRequest, ApiResponse, Transport},
    storage::{CredentialStore, MemoryStore},
    Session,
};

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "pw123456";

struct Account {
    email: String,
    password: String,
    profile: Value,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    access: HashMap<String, i64>,
    refresh: HashMap<String, i64>,
    next_token: u32,
    calls: HashMap<String, usize>,
    always_unauthorized: HashSet<String>,
}

pub struct FakeApi {
    state: Mutex<State>,
    refresh_delay: Duration,
    refresh_started: Notify,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Self::with_refresh_delay(Duration::from_millis(50))
    }

    pub fn with_refresh_delay(refresh_delay: Duration) -> Arc<Self> {
        let state = State {
            accounts: vec![Account {
                email: EMAIL.to_string(),
                password: PASSWORD.to_string(),
                profile: json!({"id": 1, "username": "a", "role": "MEMBER"}),
            }],
            next_token: 1,
            ..State::default()
        };

        Arc::new(Self {
            state: Mutex::new(state),
            refresh_delay,
            refresh_started: Notify::new(),
        })
    }

    pub fn add_account(&self, email: &str, password: &str, profile: Value) {
        self.state.lock().unwrap().accounts.push(Account {
            email: email.to_string(),
            password: password.to_string(),
            profile,
        });
    }

    /// Every access token issued so far stops being accepted
    pub fn expire_access(&self) {
        self.state.lock().unwrap().access.clear();
    }

    /// Every refresh token issued so far stops being accepted
    pub fn revoke_refresh(&self) {
        self.state.lock().unwrap().refresh.clear();
    }

    /// Answer 401 on `path` whatever the bearer
    pub fn always_unauthorized(&self, path: &str) {
        self.state.lock().unwrap().always_unauthorized.insert(path.to_string());
    }

    pub fn calls(&self, path: &str) -> usize {
        self.state.lock().unwrap().calls.get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    /// Resolves once a refresh request has reached the server
    pub async fn refresh_started(&self) {
        self.refresh_started.notified().await
    }

    fn issue(state: &mut State, user_id: i64) -> (String, String) {
        let n = state.next_token;
        state.next_token += 1;
        let access = format!("A{}", n);
        let refresh = format!("R{}", n);
        state.access.insert(access.clone(), user_id);
        state.refresh.insert(refresh.clone(), user_id);
        (access, refresh)
    }

    fn login(&self, body: &Value) -> ApiResponse {
        let mut state = self.state.lock().unwrap();
        let found = state
            .accounts
            .iter()
            .find(|a| body["email"] == a.email.as_str() && body["password"] == a.password.as_str())
            .and_then(|a| a.profile["id"].as_i64());

        match found {
            Some(user_id) => {
                let (access, refresh) = Self::issue(&mut state, user_id);
                ApiResponse::new(200, json!({"access": access, "refresh": refresh}).to_string())
            }
            None => ApiResponse::new(
                401,
                r#"{"detail": "No active account found with the given credentials"}"#,
            ),
        }
    }

    async fn refresh(&self, body: &Value) -> ApiResponse {
        self.refresh_started.notify_one();
        tokio::time::sleep(self.refresh_delay).await;

        let mut state = self.state.lock().unwrap();
        let sent = body["refresh"].as_str().unwrap_or_default().to_string();
        match state.refresh.remove(&sent) {
            Some(user_id) => {
                let (access, refresh) = Self::issue(&mut state, user_id);
                ApiResponse::new(200, json!({"access": access, "refresh": refresh}).to_string())
            }
            None => ApiResponse::new(
                401,
                r#"{"detail": "Token is invalid or expired", "code": "token_not_valid"}"#,
            ),
        }
    }

    fn protected(&self, request: &ApiRequest) -> ApiResponse {
        let state = self.state.lock().unwrap();
        if state.always_unauthorized.contains(&request.path) {
            return ApiResponse::new(401, r#"{"detail": "Given token not valid for any token type"}"#);
        }

        let user_id = request.bearer.as_ref().and_then(|token| state.access.get(token)).copied();
        let Some(user_id) = user_id else {
            return ApiResponse::new(401, r#"{"detail": "Given token not valid for any token type"}"#);
        };

        match request.path.as_str() {
            "auth/me/" => {
                let profile = state
                    .accounts
                    .iter()
                    .find(|a| a.profile["id"].as_i64() == Some(user_id))
                    .map(|a| a.profile.clone())
                    .unwrap_or(Value::Null);
                ApiResponse::new(200, profile.to_string())
            }
            "books/" => ApiResponse::new(200, "[]"),
            _ => ApiResponse::new(404, r#"{"detail": "Not found."}"#),
        }
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        *self
            .state
            .lock()
            .unwrap()
            .calls
            .entry(request.path.clone())
            .or_default() += 1;

        let body = request.body.clone().unwrap_or(Value::Null);
        Ok(match request.path.as_str() {
            "auth/login/" => self.login(&body),
            "auth/refresh/" => self.refresh(&body).await,
            _ => self.protected(&request),
        })
    }
}

/// Session over the fake API and a fresh in-memory store
pub fn session(api: &Arc<FakeApi>) -> (Session, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Session::new(api.clone(), store.clone()), store)
}

/// Session already bootstrapped and logged in as the default member
pub async fn logged_in(api: &Arc<FakeApi>) -> (Session, Arc<MemoryStore>) {
    let (session, store) = session(api);
    session.init().await;
    session.login(EMAIL, PASSWORD).await.unwrap();
    (session, store)
}

pub async fn stored(store: &dyn CredentialStore, key: &str) -> Option<String> {
    store.get(key).await.unwrap()
}
