//! HTTP server for the depot provider network mirror.
//!
//! This crate provides:
//! - The mirror protocol endpoints under `/v1/mirror`
//! - Raw object downloads for the filesystem backend
//! - Health and Prometheus endpoints

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
