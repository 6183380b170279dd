//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use depot_storage::backends::filesystem::OBJECTS_ROUTE;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/mirror/{hostname}/{namespace}/{name}/{file}",
            get(handlers::mirror_file),
        )
        .route(
            "/v1/mirror/{hostname}/{namespace}/{name}/{version}/{os}/{arch}",
            get(handlers::retrieve_archive),
        )
        .route(
            &format!("{OBJECTS_ROUTE}/{{*key}}"),
            get(handlers::get_object),
        );

    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
