//! Client for the origin registry's provider protocol.
//!
//! Every failure is classified as [`UpstreamError::Transport`] when the
//! origin could not be reached, or as an application error when it answered
//! with something unusable. The mirror's fallback decisions hinge on that
//! split.

use crate::discovery::Discovery;
use crate::error::{MirrorError, MirrorResult, ProviderError, UpstreamError, UpstreamResult};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::config::UpstreamConfig;
use depot_core::{ChecksumSet, Provider, ProviderVersions, ResolvedProvider, Sha256Digest, SigningKeys};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Operations the mirror needs from the origin registry.
#[async_trait]
pub trait UpstreamRegistry: Send + Sync + 'static {
    /// Every version of `hostname/namespace/name` with its platforms.
    async fn list_provider_versions(&self, provider: &Provider) -> UpstreamResult<ProviderVersions>;

    /// Resolve one platform build: its URLs, signing keys and the digest the
    /// release manifest lists for its archive.
    async fn get_provider(&self, provider: &Provider) -> UpstreamResult<ResolvedProvider>;

    /// The release manifest of the build's version. Needs a platform to
    /// locate the manifest, but covers every platform of the version.
    async fn sha256_sums(&self, provider: &Provider) -> UpstreamResult<ChecksumSet>;

    /// Raw bytes behind a URL returned by `get_provider`.
    async fn download(&self, url: &str) -> UpstreamResult<Bytes>;
}

/// Map a reqwest failure onto the transport/application split.
pub(crate) fn classify(url: &str, err: reqwest::Error) -> UpstreamError {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        UpstreamError::transport(url, err.to_string())
    } else {
        UpstreamError::application(url, err.to_string())
    }
}

#[derive(Deserialize)]
struct DownloadResponse {
    filename: String,
    download_url: String,
    shasums_url: String,
    #[serde(default)]
    shasums_signature_url: Option<String>,
    shasum: String,
    #[serde(default)]
    signing_keys: SigningKeys,
}

/// HTTP client for talking to origin registries and their discovery
/// documents.
pub fn build_http_client(config: &UpstreamConfig) -> MirrorResult<reqwest::Client> {
    // No overall request timeout: archive downloads may be large. Callers
    // bound each call themselves.
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.timeout())
        .build()
        .map_err(|e| MirrorError::Internal(format!("failed to build HTTP client: {e}")))
}

/// [`UpstreamRegistry`] over HTTP.
pub struct HttpUpstream {
    http: reqwest::Client,
    discovery: Arc<dyn Discovery>,
}

impl HttpUpstream {
    pub fn with_client(http: reqwest::Client, discovery: Arc<dyn Discovery>) -> Self {
        Self { http, discovery }
    }

    async fn endpoint(&self, provider: &Provider, path: &str) -> UpstreamResult<Url> {
        let base = self.discovery.providers_base_url(provider.hostname()).await?;
        base.join(path)
            .map_err(|e| UpstreamError::application(base.as_str(), format!("invalid path {path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url, provider: &Provider) -> UpstreamResult<T> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status {
                StatusCode::NOT_FOUND => "provider not found upstream".to_string(),
                other => format!("origin returned {other}"),
            };
            return Err(ProviderError {
                reason,
                provider: provider.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.bytes().await.map_err(|e| classify(url.as_str(), e))?;
        serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::application(url.as_str(), format!("malformed response: {e}")))
    }

    async fn resolve_download(&self, provider: &Provider) -> UpstreamResult<(Url, DownloadResponse)> {
        let (version, platform) = provider
            .require_platform()
            .map_err(|e| UpstreamError::application(provider.to_string(), e.to_string()))?;
        let url = self
            .endpoint(
                provider,
                &format!(
                    "{}/{}/{version}/download/{}/{}",
                    provider.namespace(),
                    provider.name(),
                    platform.os,
                    platform.arch
                ),
            )
            .await?;
        let download = self.get_json::<DownloadResponse>(&url, provider).await?;
        Ok((url, download))
    }

    async fn fetch_manifest(&self, url: &str) -> UpstreamResult<ChecksumSet> {
        let data = self.download(url).await?;
        ChecksumSet::parse(&data).map_err(|e| UpstreamError::application(url, e.to_string()))
    }
}

fn absolute(base: &Url, value: &str) -> UpstreamResult<String> {
    base.join(value)
        .map(|u| u.to_string())
        .map_err(|e| UpstreamError::application(base.as_str(), format!("invalid URL {value:?}: {e}")))
}

#[async_trait]
impl UpstreamRegistry for HttpUpstream {
    #[instrument(skip(self), fields(provider = %provider))]
    async fn list_provider_versions(&self, provider: &Provider) -> UpstreamResult<ProviderVersions> {
        let url = self
            .endpoint(
                provider,
                &format!("{}/{}/versions", provider.namespace(), provider.name()),
            )
            .await?;
        let versions: ProviderVersions = self.get_json(&url, provider).await?;
        debug!(count = versions.versions.len(), "listed upstream versions");
        Ok(versions)
    }

    #[instrument(skip(self), fields(provider = %provider))]
    async fn get_provider(&self, provider: &Provider) -> UpstreamResult<ResolvedProvider> {
        let (url, download) = self.resolve_download(provider).await?;

        let expected_name = provider
            .archive_file_name()
            .map_err(|e| UpstreamError::application(url.as_str(), e.to_string()))?;
        if download.filename != expected_name {
            return Err(UpstreamError::application(
                url.as_str(),
                format!(
                    "origin returned archive {}, expected {expected_name}",
                    download.filename
                ),
            ));
        }

        let advertised = Sha256Digest::from_hex(&download.shasum)
            .map_err(|e| UpstreamError::application(url.as_str(), e.to_string()))?;

        let shasums_url = absolute(&url, &download.shasums_url)?;
        let manifest = self.fetch_manifest(&shasums_url).await?;
        let shasum = manifest
            .checksum(&expected_name)
            .map_err(|e| UpstreamError::application(shasums_url.as_str(), e.to_string()))?;
        if shasum != advertised {
            return Err(UpstreamError::application(
                url.as_str(),
                format!("manifest lists {shasum} for {expected_name}, origin advertised {advertised}"),
            ));
        }

        Ok(ResolvedProvider {
            provider: provider.clone(),
            filename: download.filename,
            download_url: absolute(&url, &download.download_url)?,
            shasums_url,
            shasums_signature_url: download
                .shasums_signature_url
                .filter(|s| !s.is_empty())
                .map(|s| absolute(&url, &s))
                .transpose()?,
            shasum,
            signing_keys: download.signing_keys,
        })
    }

    #[instrument(skip(self), fields(provider = %provider))]
    async fn sha256_sums(&self, provider: &Provider) -> UpstreamResult<ChecksumSet> {
        let (url, download) = self.resolve_download(provider).await?;
        let shasums_url = absolute(&url, &download.shasums_url)?;
        self.fetch_manifest(&shasums_url).await
    }

    #[instrument(skip(self))]
    async fn download(&self, url: &str) -> UpstreamResult<Bytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::application(
                url,
                format!("download returned {status}"),
            ));
        }

        response.bytes().await.map_err(|e| classify(url, e))
    }
}
