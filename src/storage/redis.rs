//! Redis credential store, shared by every process using the same namespace

use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use super::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use crate::error::{ClientError, ClientResult};

#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    namespace: String,
}

impl RedisStore {
    /// Create a new Redis store and check the server answers
    pub async fn new(url: &str, namespace: &str) -> ClientResult<Self> {
        let client = Client::open(url)
            .map_err(|e| ClientError::Storage(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ClientError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| ClientError::Storage(format!("Redis connection test failed: {}", e)))?;

        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:session:{}", self.namespace, key)
    }

    /// Every key a session writes, in this namespace
    fn session_keys(&self) -> Vec<String> {
        [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY]
            .iter()
            .map(|key| self.key(key))
            .collect()
    }

    async fn connection(&self) -> ClientResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ClientError::Storage(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl CredentialStore for RedisStore {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(self.key(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> ClientResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }

    async fn clear(&self) -> ClientResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.session_keys()).await?;
        Ok(())
    }
}
