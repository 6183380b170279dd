//! Resolution of a registry hostname to its providers protocol base URL.

use crate::error::{UpstreamError, UpstreamResult};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const WELL_KNOWN_PATH: &str = "/.well-known/terraform.json";

/// Looks up where a registry host serves the providers protocol.
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Base URL ending in `/`, e.g. `https://registry.terraform.io/v1/providers/`.
    async fn providers_base_url(&self, hostname: &str) -> UpstreamResult<Url>;
}

#[derive(Deserialize)]
struct ServiceDocument {
    #[serde(rename = "providers.v1")]
    providers_v1: Option<String>,
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Discovery through the host's `/.well-known/terraform.json` document.
/// Results are cached for the life of the process.
pub struct RemoteServiceDiscovery {
    http: reqwest::Client,
    scheme: &'static str,
    cache: DashMap<String, Url>,
}

impl RemoteServiceDiscovery {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            scheme: "https",
            cache: DashMap::new(),
        }
    }

    /// Fetch service documents over plain HTTP. Only for tests.
    pub fn insecure_http(mut self) -> Self {
        self.scheme = "http";
        self
    }
}

#[async_trait]
impl Discovery for RemoteServiceDiscovery {
    async fn providers_base_url(&self, hostname: &str) -> UpstreamResult<Url> {
        if let Some(url) = self.cache.get(hostname) {
            return Ok(url.clone());
        }

        let document_url = Url::parse(&format!("{}://{hostname}{WELL_KNOWN_PATH}", self.scheme))
            .map_err(|e| UpstreamError::application(hostname, format!("invalid hostname: {e}")))?;

        let response = self
            .http
            .get(document_url.clone())
            .send()
            .await
            .map_err(|e| crate::upstream::classify(document_url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::application(
                document_url.as_str(),
                format!("service discovery returned {status}"),
            ));
        }

        let document: ServiceDocument = response
            .json()
            .await
            .map_err(|e| crate::upstream::classify(document_url.as_str(), e))?;

        let providers = document.providers_v1.ok_or_else(|| {
            UpstreamError::application(
                document_url.as_str(),
                "host does not advertise providers.v1",
            )
        })?;

        let base = document_url.join(&providers).map_err(|e| {
            UpstreamError::application(
                document_url.as_str(),
                format!("invalid providers.v1 value {providers:?}: {e}"),
            )
        })?;
        let base = with_trailing_slash(base);

        debug!(hostname, base_url = %base, "discovered providers endpoint");
        self.cache.insert(hostname.to_string(), base.clone());
        Ok(base)
    }
}

/// Fixed hostname to base URL map, deferring unknown hosts to `fallback`.
pub struct StaticDiscovery {
    overrides: BTreeMap<String, Url>,
    fallback: Option<Arc<dyn Discovery>>,
}

impl StaticDiscovery {
    pub fn new(overrides: &BTreeMap<String, String>) -> Result<Self, String> {
        let overrides = overrides
            .iter()
            .map(|(host, url)| {
                Url::parse(url)
                    .map(|u| (host.clone(), with_trailing_slash(u)))
                    .map_err(|e| format!("invalid discovery override for {host}: {e}"))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            overrides,
            fallback: None,
        })
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn Discovery>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn providers_base_url(&self, hostname: &str) -> UpstreamResult<Url> {
        if let Some(url) = self.overrides.get(hostname) {
            return Ok(url.clone());
        }
        match &self.fallback {
            Some(fallback) => fallback.providers_base_url(hostname).await,
            None => Err(UpstreamError::application(
                hostname,
                "no discovery override for host",
            )),
        }
    }
}
