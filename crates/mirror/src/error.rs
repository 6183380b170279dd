//! Error types for the mirror service and its upstream client.

use depot_core::Provider;
use depot_storage::StorageError;
use thiserror::Error;

/// The origin answered a provider request with a non-success status.
#[derive(Debug, Error)]
#[error("{reason}: {provider} (status {status})")]
pub struct ProviderError {
    pub reason: String,
    pub provider: Provider,
    pub status: u16,
}

/// Failure talking to the origin registry.
///
/// `Transport` means the origin could not be reached at all (connection
/// refused, DNS failure, timeout). Everything else means it was reached and
/// answered with something unusable.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("origin unreachable at {url}: {message}")]
    Transport { url: String, message: String },

    #[error("invalid response from {url}: {message}")]
    Application { url: String, message: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl UpstreamError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn application(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Application {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Result type for upstream calls.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// Mirror service error type.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("origin lists no platforms for {0}")]
    NoPlatforms(String),

    #[error(transparent)]
    Core(depot_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<depot_core::Error> for MirrorError {
    fn from(err: depot_core::Error) -> Self {
        match err {
            depot_core::Error::InvalidProvider(msg) => MirrorError::Validation(msg),
            other => MirrorError::Core(other),
        }
    }
}

impl MirrorError {
    /// Whether the origin could not be reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, MirrorError::Upstream(e) if e.is_transport())
    }

    /// Whether the storage reported a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MirrorError::Storage(e) if e.is_not_found())
    }
}

/// Result type for mirror operations.
pub type MirrorResult<T> = std::result::Result<T, MirrorError>;
