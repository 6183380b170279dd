//! Mirror persistence on top of an [`ObjectStore`].
//!
//! Key layout:
//!
//! ```text
//! mirror/providers/<hostname>/<namespace>/<name>/<archive|SHA256SUMS|SHA256SUMS.sig>
//! mirror/providers/<hostname>/<namespace>/signing-keys.json
//! ```

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{ChecksumSet, MirroredProvider, Provider, SigningKeys};
use std::sync::Arc;
use tracing::debug;

const MIRROR_ROOT: &str = "mirror/providers";
const SIGNING_KEYS_FILE: &str = "signing-keys.json";

/// Directory holding every release file of `hostname/namespace/name`.
pub fn provider_prefix(provider: &Provider) -> String {
    format!(
        "{MIRROR_ROOT}/{}/{}/{}",
        provider.hostname(),
        provider.namespace(),
        provider.name()
    )
}

/// Key of one release file of a provider.
pub fn provider_file_key(provider: &Provider, file_name: &str) -> String {
    format!("{}/{file_name}", provider_prefix(provider))
}

/// Key of the signing key set for a namespace on a host.
pub fn signing_keys_key(hostname: &str, namespace: &str) -> String {
    format!("{MIRROR_ROOT}/{hostname}/{namespace}/{SIGNING_KEYS_FILE}")
}

/// Persistence the mirror service and copier need.
///
/// `NotFound` is reserved for "nothing mirrored here"; any other error means
/// the store itself failed.
#[async_trait]
pub trait MirrorStorage: Send + Sync + 'static {
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn download(&self, key: &str) -> StorageResult<Bytes>;

    /// Store `data` at `key`. With `overwrite` unset an existing object is an
    /// `AlreadyExists` error and is left untouched.
    async fn upload(&self, key: &str, data: Bytes, overwrite: bool) -> StorageResult<()>;

    /// Every mirrored platform build of the coordinate, restricted to its
    /// version when one is set. `NotFound` when there are none.
    async fn list_mirrored_providers(&self, provider: &Provider)
    -> StorageResult<Vec<MirroredProvider>>;

    /// The mirrored build for an exact version and platform.
    async fn get_mirrored_provider(&self, provider: &Provider) -> StorageResult<MirroredProvider>;

    /// The mirrored checksum manifest of the coordinate's version.
    async fn mirrored_sha256_sums(&self, provider: &Provider) -> StorageResult<ChecksumSet>;

    async fn mirrored_signing_keys(
        &self,
        hostname: &str,
        namespace: &str,
    ) -> StorageResult<SigningKeys>;

    async fn upload_mirrored_signing_keys(
        &self,
        hostname: &str,
        namespace: &str,
        keys: &SigningKeys,
    ) -> StorageResult<()>;

    /// Store one release file of the coordinate, replacing any previous copy.
    async fn upload_mirrored_file(
        &self,
        provider: &Provider,
        file_name: &str,
        data: Bytes,
    ) -> StorageResult<()>;
}

/// [`MirrorStorage`] backed by any [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectMirrorStorage {
    store: Arc<dyn ObjectStore>,
}

impl ObjectMirrorStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

fn check_file_name(file_name: &str) -> StorageResult<()> {
    if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "invalid release file name: {file_name:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl MirrorStorage for ObjectMirrorStorage {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.store.exists(key).await
    }

    async fn download(&self, key: &str) -> StorageResult<Bytes> {
        self.store.get(key).await
    }

    async fn upload(&self, key: &str, data: Bytes, overwrite: bool) -> StorageResult<()> {
        if overwrite {
            return self.store.put(key, data).await;
        }
        if self.store.put_if_not_exists(key, data).await? {
            Ok(())
        } else {
            Err(StorageError::AlreadyExists(key.to_string()))
        }
    }

    async fn list_mirrored_providers(
        &self,
        provider: &Provider,
    ) -> StorageResult<Vec<MirroredProvider>> {
        provider.validate()?;
        let prefix = format!("{}/", provider_prefix(provider));

        let mut mirrored = Vec::new();
        for key in self.store.list(&prefix).await? {
            let file_name = &key[prefix.len()..];
            let Ok(found) = Provider::from_archive_file_name(
                provider.hostname(),
                provider.namespace(),
                file_name,
            ) else {
                continue;
            };
            if found.name() != provider.name() {
                continue;
            }
            if let Some(version) = provider.version()
                && found.version() != Some(version)
            {
                continue;
            }

            let download_url = self.store.download_url(&key).await?;
            mirrored.push(MirroredProvider {
                provider: found,
                download_url,
            });
        }

        if mirrored.is_empty() {
            return Err(StorageError::NotFound(match provider.version() {
                Some(version) => format!("{prefix}*_{version}_*"),
                None => prefix,
            }));
        }

        debug!(provider = %provider, count = mirrored.len(), "listed mirrored providers");
        Ok(mirrored)
    }

    async fn get_mirrored_provider(&self, provider: &Provider) -> StorageResult<MirroredProvider> {
        let key = provider_file_key(provider, &provider.archive_file_name()?);
        if !self.store.exists(&key).await? {
            return Err(StorageError::NotFound(key));
        }
        Ok(MirroredProvider {
            provider: provider.clone(),
            download_url: self.store.download_url(&key).await?,
        })
    }

    async fn mirrored_sha256_sums(&self, provider: &Provider) -> StorageResult<ChecksumSet> {
        let key = provider_file_key(provider, &provider.shasums_file_name()?);
        let data = self.store.get(&key).await?;
        ChecksumSet::parse(&data).map_err(|source| StorageError::Corrupt { key, source })
    }

    async fn mirrored_signing_keys(
        &self,
        hostname: &str,
        namespace: &str,
    ) -> StorageResult<SigningKeys> {
        let key = signing_keys_key(hostname, namespace);
        let data = self.store.get(&key).await?;
        SigningKeys::from_json(&data).map_err(|source| StorageError::Corrupt { key, source })
    }

    async fn upload_mirrored_signing_keys(
        &self,
        hostname: &str,
        namespace: &str,
        keys: &SigningKeys,
    ) -> StorageResult<()> {
        Provider::new(hostname, namespace, "signing-keys").validate()?;
        let key = signing_keys_key(hostname, namespace);
        self.upload(&key, Bytes::from(keys.to_json()?), true).await
    }

    async fn upload_mirrored_file(
        &self,
        provider: &Provider,
        file_name: &str,
        data: Bytes,
    ) -> StorageResult<()> {
        provider.validate()?;
        check_file_name(file_name)?;
        let key = provider_file_key(provider, file_name);
        self.upload(&key, data, true).await
    }
}
