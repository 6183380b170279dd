//! Server test utilities.

use depot_core::config::AppConfig;
use depot_mirror::{
    Copier, CopierHandle, HttpUpstream, MirrorService, StaticDiscovery, build_http_client,
};
use depot_server::{AppState, create_router};
use depot_storage::{MirrorStorage, ObjectMirrorStorage};
use std::sync::Arc;
use tempfile::TempDir;

/// Hostname every test provider lives under. Discovery for it is pinned to
/// the mock origin.
pub const ORIGIN_HOST: &str = "registry.test";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage: Arc<ObjectMirrorStorage>,
    copier_handle: Option<CopierHandle>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// A server whose origin registry serves the providers protocol at
    /// `providers_base_url`.
    pub async fn new(providers_base_url: &str) -> Self {
        Self::with_config(providers_base_url, |_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(providers_base_url: &str, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let mut config = AppConfig::for_testing(temp_dir.path().join("storage"));
        config.upstream.timeout_secs = 2;
        config
            .upstream
            .discovery_overrides
            .insert(ORIGIN_HOST.to_string(), providers_base_url.to_string());
        modifier(&mut config);

        let store = depot_storage::from_config(&config.storage)
            .await
            .expect("Failed to create storage backend");
        let storage = Arc::new(ObjectMirrorStorage::new(store.clone()));

        let http = build_http_client(&config.upstream).expect("Failed to build HTTP client");
        let discovery = StaticDiscovery::new(&config.upstream.discovery_overrides)
            .expect("Invalid discovery overrides");
        let upstream = Arc::new(HttpUpstream::with_client(http, Arc::new(discovery)));

        let (copier, copier_handle) = Copier::spawn(
            &config.copier,
            storage.clone(),
            upstream.clone(),
            config.copier.transfer_timeout(),
            Some(depot_server::metrics::copier_observer()),
        );
        let mirror = MirrorService::new(
            upstream,
            storage.clone(),
            copier,
            config.upstream.timeout(),
        );

        depot_server::metrics::register_metrics();
        let state = AppState::new(config, mirror, store);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage,
            copier_handle: Some(copier_handle),
            _temp_dir: temp_dir,
        }
    }

    /// Mirror storage view of the server's object store.
    pub fn mirror_storage(&self) -> &dyn MirrorStorage {
        self.storage.as_ref()
    }

    /// Finish every queued copy job.
    pub async fn drain_copier(&mut self) {
        if let Some(handle) = self.copier_handle.take() {
            handle.shutdown().await;
        }
    }
}
