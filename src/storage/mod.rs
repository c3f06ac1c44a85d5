//! Durable key-value persistence for session credentials

pub mod credentials;
pub mod file;
pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::{AppConfig, StorageBackend},
    error::ClientResult,
};

pub use credentials::Credentials;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Key holding the current access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key holding the current refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Key holding the cached profile, serialized as JSON
pub const USER_KEY: &str = "user";

/// Plain string storage with no validation or network logic.
///
/// Implementations are shared between every component of a session, so
/// they synchronize internally.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> ClientResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> ClientResult<()>;

    async fn remove(&self, key: &str) -> ClientResult<()>;

    /// Remove the session entries (the three keys above). Backends that own
    /// their whole keyspace may drop everything.
    async fn clear(&self) -> ClientResult<()>;
}

/// Open the store selected by configuration
pub async fn open_store(config: &AppConfig) -> ClientResult<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::open(&config.storage.path).await?),
        StorageBackend::Redis => {
            Arc::new(RedisStore::new(&config.redis.url, &config.storage.namespace).await?)
        }
    };

    tracing::debug!("Credential store opened ({:?})", config.storage.backend);
    Ok(store)
}
