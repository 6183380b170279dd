use super::fakes::{archive_bytes, manifest_of};
use bytes::Bytes;
use depot_core::config::CopierConfig;
use depot_core::{Platform, Provider};
use depot_mirror::{Copier, CopierHandle, MirrorService, UpstreamRegistry};
use depot_storage::{FilesystemBackend, MirrorStorage, ObjectMirrorStorage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const MIRROR_BASE: &str = "http://mirror.test";

/// `registry.terraform.io/abbeylabs/abbey`
pub fn abbey() -> Provider {
    Provider::new("registry.terraform.io", "abbeylabs", "abbey")
}

pub fn darwin_arm64() -> Platform {
    Platform::new("darwin", "arm64")
}

pub fn linux_amd64() -> Platform {
    Platform::new("linux", "amd64")
}

/// A mirror store over a fresh temp directory. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn mirror_storage() -> (TempDir, Arc<ObjectMirrorStorage>) {
    let dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(dir.path())
        .await
        .unwrap()
        .with_public_base_url(MIRROR_BASE);
    (dir, Arc::new(ObjectMirrorStorage::new(Arc::new(backend))))
}

/// Mirror `version` of `provider` on `platforms`, the way a finished copy
/// leaves it.
#[allow(dead_code)]
pub async fn seed_mirror(
    storage: &dyn MirrorStorage,
    provider: &Provider,
    version: &str,
    platforms: &[Platform],
) {
    let at_version = provider.with_version(version);
    storage
        .upload_mirrored_file(
            &at_version,
            &at_version.shasums_file_name().unwrap(),
            Bytes::from(manifest_of(&at_version, platforms)),
        )
        .await
        .unwrap();

    for p in platforms {
        let build = at_version.with_platform(&p.os, &p.arch);
        let file = build.archive_file_name().unwrap();
        storage
            .upload_mirrored_file(&build, &file, archive_bytes(&file))
            .await
            .unwrap();
    }
}

#[allow(dead_code)]
pub fn copier_config(workers: usize, queue_capacity: usize, deduplicate: bool) -> CopierConfig {
    CopierConfig {
        queue_capacity,
        workers,
        deduplicate,
        ..CopierConfig::default()
    }
}

/// A service with a two-worker copier.
#[allow(dead_code)]
pub fn mirror_service(
    upstream: Arc<dyn UpstreamRegistry>,
    storage: Arc<dyn MirrorStorage>,
    upstream_timeout: Duration,
) -> (MirrorService, CopierHandle) {
    let (copier, handle) = Copier::spawn(
        &copier_config(2, 16, false),
        storage.clone(),
        upstream.clone(),
        Duration::from_secs(30),
        None,
    );
    (
        MirrorService::new(upstream, storage, copier, upstream_timeout),
        handle,
    )
}

/// Poll `check` until it holds or five seconds pass.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
