//! Typed access to the session entries of a [`CredentialStore`]
//!
//! Every write goes through one lock that also guards a generation counter.
//! Starting a new identity (login) or ending one (logout) bumps the
//! generation; refresh and profile writes carry the generation they started
//! under and are dropped if it moved. A logout that lands while a refresh is
//! in flight therefore always leaves the store cleared.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use crate::{
    error::ClientResult,
    models::{CredentialPair, UserProfile},
};

#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn CredentialStore>,
    generation: Arc<Mutex<u64>>,
}

impl Credentials {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Current generation, to be passed back to the conditional writes
    pub async fn generation(&self) -> u64 {
        *self.generation.lock().await
    }

    pub async fn access_token(&self) -> ClientResult<Option<String>> {
        self.store.get(ACCESS_TOKEN_KEY).await
    }

    /// Access token together with the generation it belongs to, read under
    /// the write lock so the two always match
    pub async fn access_token_at(&self) -> ClientResult<(u64, Option<String>)> {
        let generation = self.generation.lock().await;
        let access = self.store.get(ACCESS_TOKEN_KEY).await?;
        Ok((*generation, access))
    }

    pub async fn refresh_token(&self) -> ClientResult<Option<String>> {
        self.store.get(REFRESH_TOKEN_KEY).await
    }

    pub async fn refresh_token_at(&self) -> ClientResult<(u64, Option<String>)> {
        let generation = self.generation.lock().await;
        let refresh = self.store.get(REFRESH_TOKEN_KEY).await?;
        Ok((*generation, refresh))
    }

    /// Cached profile. An unreadable entry counts as absent.
    pub async fn user(&self) -> ClientResult<Option<UserProfile>> {
        let Some(raw) = self.store.get(USER_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached user profile: {}", e);
                Ok(None)
            }
        }
    }

    /// Store the pair of a newly established identity and return the new
    /// generation.
    pub async fn replace_pair(&self, pair: &CredentialPair) -> ClientResult<u64> {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.store.remove(USER_KEY).await?;
        self.write_pair(pair).await?;
        Ok(*generation)
    }

    /// Store a refreshed pair unless the identity changed since `expected`.
    /// Returns whether the pair was written.
    pub async fn update_pair(&self, expected: u64, pair: &CredentialPair) -> ClientResult<bool> {
        let generation = self.generation.lock().await;
        if *generation != expected {
            return Ok(false);
        }
        self.write_pair(pair).await?;
        Ok(true)
    }

    /// Cache a profile unless the identity changed since `expected`
    pub async fn update_user(&self, expected: u64, user: &UserProfile) -> ClientResult<bool> {
        let generation = self.generation.lock().await;
        if *generation != expected {
            return Ok(false);
        }
        let raw = serde_json::to_string(user)?;
        self.store.set(USER_KEY, &raw).await?;
        Ok(true)
    }

    /// Drop every credential and invalidate in-flight writes
    pub async fn clear(&self) -> ClientResult<()> {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.store.clear().await
    }

    /// Clear only if the identity is still the one of `expected`. Returns
    /// whether anything was cleared; a newer login is left untouched.
    pub async fn clear_if(&self, expected: u64) -> ClientResult<bool> {
        let mut generation = self.generation.lock().await;
        if *generation != expected {
            return Ok(false);
        }
        *generation += 1;
        self.store.clear().await?;
        Ok(true)
    }

    async fn write_pair(&self, pair: &CredentialPair) -> ClientResult<()> {
        self.store.set(ACCESS_TOKEN_KEY, &pair.access).await?;
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh).await
    }
}
