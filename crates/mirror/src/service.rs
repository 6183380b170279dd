//! The provider network mirror protocol.
//!
//! Each operation asks the origin first, bounded by a per-call deadline. Only
//! a transport failure (including the deadline expiring) sends a listing to
//! the mirror store; an origin that answers with an error is reported as is.
//! Archive retrieval prefers the mirror and backfills it on a miss.

use crate::copier::Copier;
use crate::error::{MirrorError, MirrorResult, UpstreamError, UpstreamResult};
use crate::upstream::UpstreamRegistry;
use depot_core::{ChecksumSet, MirroredProvider, Platform, Provider};
use depot_storage::{MirrorStorage, StorageError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Serializes as `{}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmptyObject {}

/// `GET .../index.json` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListVersionsResponse {
    pub versions: BTreeMap<String, EmptyObject>,
    #[serde(skip)]
    pub mirror_source: bool,
}

/// One installable archive of a version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Archive {
    pub url: String,
    pub hashes: Vec<String>,
}

/// `GET .../<version>.json` body, keyed by `<os>_<arch>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListInstallationPackagesResponse {
    pub archives: BTreeMap<String, Archive>,
    #[serde(skip)]
    pub mirror_source: bool,
}

/// Where a client should fetch an archive from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub location: String,
    pub mirror_source: bool,
}

/// Mirror orchestration over an origin registry and a mirror store.
#[derive(Clone)]
pub struct MirrorService {
    upstream: Arc<dyn UpstreamRegistry>,
    storage: Arc<dyn MirrorStorage>,
    copier: Copier,
    upstream_timeout: Duration,
}

impl MirrorService {
    pub fn new(
        upstream: Arc<dyn UpstreamRegistry>,
        storage: Arc<dyn MirrorStorage>,
        copier: Copier,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            storage,
            copier,
            upstream_timeout,
        }
    }

    pub fn copier(&self) -> &Copier {
        &self.copier
    }

    /// Run one origin call under the deadline. Expiry counts as the origin
    /// being unreachable.
    async fn bounded<T>(
        &self,
        provider: &Provider,
        call: impl Future<Output = UpstreamResult<T>>,
    ) -> UpstreamResult<T> {
        tokio::time::timeout(self.upstream_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(UpstreamError::transport(
                    provider.to_string(),
                    format!("no response within {:?}", self.upstream_timeout),
                ))
            })
    }

    /// Versions of `hostname/namespace/name`.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn list_versions(&self, provider: &Provider) -> MirrorResult<ListVersionsResponse> {
        provider.validate()?;

        let upstream_err = match self
            .bounded(provider, self.upstream.list_provider_versions(provider))
            .await
        {
            Ok(upstream) => {
                return Ok(ListVersionsResponse {
                    versions: upstream
                        .versions
                        .into_iter()
                        .map(|v| (v.version, EmptyObject {}))
                        .collect(),
                    mirror_source: false,
                });
            }
            Err(e) if e.is_transport() => e,
            Err(e) => return Err(e.into()),
        };

        warn!(error = %upstream_err, "origin unreachable, listing versions from mirror");
        let mirrored = self.storage.list_mirrored_providers(provider).await?;
        Ok(ListVersionsResponse {
            versions: mirrored
                .into_iter()
                .filter_map(|m| m.provider.version().map(str::to_string))
                .map(|v| (v, EmptyObject {}))
                .collect(),
            mirror_source: true,
        })
    }

    /// Installable archives of one version.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn list_installation_packages(
        &self,
        provider: &Provider,
    ) -> MirrorResult<ListInstallationPackagesResponse> {
        let version = provider.require_version()?;

        let platforms = match self
            .bounded(provider, self.upstream.list_provider_versions(provider))
            .await
        {
            Ok(upstream) => upstream.find(version).map(|v| v.platforms.clone()),
            Err(e) if e.is_transport() => {
                warn!(error = %e, "origin unreachable, listing packages from mirror");
                None
            }
            Err(e) => return Err(e.into()),
        };

        match platforms {
            Some(platforms) => self.upstream_packages(provider, &platforms).await,
            None => {
                debug!("version not served by origin, trying mirror");
                self.mirrored_packages(provider).await
            }
        }
    }

    async fn upstream_packages(
        &self,
        provider: &Provider,
        platforms: &[Platform],
    ) -> MirrorResult<ListInstallationPackagesResponse> {
        // One manifest covers every platform of a version; any platform
        // locates it.
        let first = platforms
            .first()
            .ok_or_else(|| MirrorError::NoPlatforms(provider.to_string()))?;
        let probe = provider.with_platform(&first.os, &first.arch);
        let sums = self
            .bounded(&probe, self.upstream.sha256_sums(&probe))
            .await?;

        let mut archives = BTreeMap::new();
        for platform in platforms {
            let file_name = provider
                .with_platform(&platform.os, &platform.arch)
                .archive_file_name()?;
            archives.insert(
                platform.key(),
                Archive {
                    hashes: vec![sums.zh_hash(&file_name)?],
                    url: file_name,
                },
            );
        }

        Ok(ListInstallationPackagesResponse {
            archives,
            mirror_source: false,
        })
    }

    async fn mirrored_packages(
        &self,
        provider: &Provider,
    ) -> MirrorResult<ListInstallationPackagesResponse> {
        let mirrored = self.storage.list_mirrored_providers(provider).await?;
        let Some(first) = mirrored.first() else {
            return Err(StorageError::NotFound(provider.to_string()).into());
        };
        let sums = self.storage.mirrored_sha256_sums(&first.provider).await?;

        Ok(ListInstallationPackagesResponse {
            archives: mirrored_archives(&mirrored, &sums)?,
            mirror_source: true,
        })
    }

    /// Location of one platform archive.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn retrieve_archive(&self, provider: &Provider) -> MirrorResult<ArchiveLocation> {
        provider.require_platform()?;

        match self.storage.get_mirrored_provider(provider).await {
            Ok(mirrored) => {
                return Ok(ArchiveLocation {
                    location: mirrored.download_url,
                    mirror_source: true,
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let resolved = self
            .bounded(provider, self.upstream.get_provider(provider))
            .await?;
        let location = resolved.download_url.clone();

        self.copier.submit(resolved);

        Ok(ArchiveLocation {
            location,
            mirror_source: false,
        })
    }
}

fn mirrored_archives(
    mirrored: &[MirroredProvider],
    sums: &ChecksumSet,
) -> MirrorResult<BTreeMap<String, Archive>> {
    let mut archives = BTreeMap::new();
    for entry in mirrored {
        let (_, platform) = entry.provider.require_platform()?;
        let file_name = entry.provider.archive_file_name()?;
        archives.insert(
            platform.key(),
            Archive {
                url: entry.download_url.clone(),
                hashes: vec![sums.zh_hash(&file_name)?],
            },
        );
    }
    Ok(archives)
}
