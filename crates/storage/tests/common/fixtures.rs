use depot_core::{Platform, Provider};
use depot_storage::{FilesystemBackend, ObjectMirrorStorage};
use std::sync::Arc;
use tempfile::TempDir;

/// A mirror store over a fresh temp directory. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn mirror_storage() -> (TempDir, ObjectMirrorStorage) {
    let dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(dir.path())
        .await
        .unwrap()
        .with_public_base_url("http://mirror.test");
    (dir, ObjectMirrorStorage::new(Arc::new(backend)))
}

/// `registry.terraform.io/abbeylabs/abbey`
pub fn abbey() -> Provider {
    Provider::new("registry.terraform.io", "abbeylabs", "abbey")
}

/// A SHA256SUMS body listing every platform archive of `provider`'s version,
/// with digest `i` repeated for the i-th platform.
#[allow(dead_code)]
pub fn manifest_for(provider: &Provider, platforms: &[Platform]) -> String {
    platforms
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let file = provider
                .with_platform(&p.os, &p.arch)
                .archive_file_name()
                .unwrap();
            let digit = char::from_digit((i % 16) as u32, 16).unwrap();
            format!("{}  {file}\n", digit.to_string().repeat(64))
        })
        .collect()
}
