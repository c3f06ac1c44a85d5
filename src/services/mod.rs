//! Client services

pub mod api;
pub mod library;
pub mod refresh;
pub mod session;
pub mod transport;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::ClientResult,
    storage::{self, CredentialStore},
};

/// Container for all services sharing one session
#[derive(Clone)]
pub struct Services {
    pub session: session::Session,
    pub library: library::LibraryService,
}

impl Services {
    /// Create all services over the given transport and store
    pub fn new(transport: Arc<dyn transport::Transport>, store: Arc<dyn CredentialStore>) -> Self {
        let session = session::Session::new(transport, store);
        let library = library::LibraryService::new(session.api().clone());
        Self { session, library }
    }

    /// Wire the HTTP transport and the configured credential store
    pub async fn from_config(config: &AppConfig) -> ClientResult<Self> {
        let transport = Arc::new(transport::HttpTransport::new(&config.api)?);
        let store = storage::open_store(config).await?;
        Ok(Self::new(transport, store))
    }
}
