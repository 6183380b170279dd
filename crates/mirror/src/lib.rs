//! Provider network mirror for depot.
//!
//! This crate contains:
//! - Service discovery of origin registries
//! - The origin registry HTTP client
//! - The background copier that fills the mirror store
//! - [`MirrorService`], which answers the mirror protocol

pub mod copier;
pub mod discovery;
pub mod error;
pub mod service;
pub mod upstream;

pub use copier::{Copier, CopierHandle, JobOutcome, OutcomeObserver, SubmitResult};
pub use discovery::{Discovery, RemoteServiceDiscovery, StaticDiscovery};
pub use error::{MirrorError, MirrorResult, ProviderError, UpstreamError, UpstreamResult};
pub use service::{
    Archive, ArchiveLocation, EmptyObject, ListInstallationPackagesResponse, ListVersionsResponse,
    MirrorService,
};
pub use upstream::{HttpUpstream, UpstreamRegistry, build_http_client};
