//! Application state shared across handlers.

use depot_core::config::AppConfig;
use depot_mirror::MirrorService;
use depot_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Mirror protocol orchestration.
    pub mirror: MirrorService,
    /// Object store backing the mirror, served under `/v1/objects`.
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(config: AppConfig, mirror: MirrorService, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config: Arc::new(config),
            mirror,
            store,
        }
    }
}
