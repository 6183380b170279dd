//! Object storage abstraction and backends for depot.
//!
//! This crate provides:
//! - A flat object store trait with atomic writes
//! - Backends: local filesystem and S3-compatible
//! - The mirror storage contract and its key layout

pub mod backends;
pub mod error;
pub mod mirror;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use mirror::{MirrorStorage, ObjectMirrorStorage};
pub use traits::{ByteStream, ObjectStore};

use depot_core::config::StorageConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem {
            path,
            public_base_url,
        } => {
            let backend = FilesystemBackend::new(path)
                .await?
                .with_public_base_url(public_base_url.clone());
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
            presign_expiry_secs,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?
            .with_presign_expiry(Duration::from_secs(*presign_expiry_secs));
            Ok(Arc::new(backend))
        }
    }
}
