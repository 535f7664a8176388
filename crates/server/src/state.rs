use std::sync::Arc;

use embedding_worker::{BackendSelector, Settings};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Debug, Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,

    /// Worker settings, loaded once at start-up.
    pub settings: Arc<Settings>,

    /// Cached model instances, shared across requests.
    pub selector: Arc<BackendSelector>,
}

impl ServerState {
    pub fn new(config: ServerConfig, settings: Settings) -> Self {
        Self {
            config: Arc::new(config),
            settings: Arc::new(settings),
            selector: Arc::new(BackendSelector::new()),
        }
    }
}
