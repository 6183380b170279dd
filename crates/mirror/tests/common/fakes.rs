use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{
    ChecksumSet, GpgPublicKey, Platform, Provider, ProviderVersion, ProviderVersions,
    ResolvedProvider, Sha256Digest, SigningKeys,
};
use depot_mirror::{ProviderError, UpstreamError, UpstreamRegistry, UpstreamResult};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const RELEASES_BASE: &str = "https://releases.test";

/// Deterministic archive contents for a release file.
#[allow(dead_code)]
pub fn archive_bytes(file_name: &str) -> Bytes {
    Bytes::from(format!("zip contents of {file_name}"))
}

/// A SHA256SUMS body with the real digests of [`archive_bytes`].
#[allow(dead_code)]
pub fn manifest_of(provider: &Provider, platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(|p| {
            let file = provider
                .with_platform(&p.os, &p.arch)
                .archive_file_name()
                .unwrap();
            format!("{}  {file}\n", Sha256Digest::compute(&archive_bytes(&file)))
        })
        .collect()
}

/// How the fake origin answers.
#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    Serve,
    /// Connection refused.
    Unreachable,
    /// Answers 500.
    Broken,
    /// Never answers.
    Hang,
    /// Lists and resolves normally but answers 500 for SHA256SUMS.
    BrokenManifest,
}

/// In-memory origin registry for a single namespace/name.
#[allow(dead_code)]
pub struct FakeUpstream {
    versions: Vec<ProviderVersion>,
    manifests: BTreeMap<String, String>,
    corrupt_archives: bool,
    behavior: Mutex<Behavior>,
    gate: Option<Semaphore>,
    pub list_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub sums_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeUpstream {
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            manifests: BTreeMap::new(),
            corrupt_archives: false,
            behavior: Mutex::new(Behavior::Serve),
            gate: None,
            list_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            sums_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    /// Serve `version` of `provider` on `platforms` with a manifest of the
    /// real archive digests.
    pub fn with_version(mut self, provider: &Provider, version: &str, platforms: &[Platform]) -> Self {
        let at_version = provider.with_version(version);
        self.manifests
            .insert(version.to_string(), manifest_of(&at_version, platforms));
        self.versions.push(ProviderVersion {
            version: version.to_string(),
            protocols: vec!["5.0".to_string()],
            platforms: platforms.to_vec(),
        });
        self
    }

    pub fn with_manifest(mut self, version: &str, manifest: impl Into<String>) -> Self {
        self.manifests.insert(version.to_string(), manifest.into());
        self
    }

    /// Serve archives whose bytes do not match the manifest.
    pub fn with_corrupt_archives(mut self) -> Self {
        self.corrupt_archives = true;
        self
    }

    /// Hold every download until [`FakeUpstream::open_gate`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
            + self.resolve_calls.load(Ordering::SeqCst)
            + self.sums_calls.load(Ordering::SeqCst)
            + self.download_calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, url: &str) -> UpstreamResult<()> {
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            Behavior::Serve | Behavior::BrokenManifest => Ok(()),
            Behavior::Unreachable => Err(UpstreamError::transport(url, "connection refused")),
            Behavior::Broken => Err(UpstreamError::application(url, "origin returned 500")),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    fn manifest(&self, provider: &Provider) -> UpstreamResult<String> {
        let version = provider.version().unwrap_or_default();
        self.manifests.get(version).cloned().ok_or_else(|| {
            ProviderError {
                reason: "provider not found upstream".into(),
                provider: provider.clone(),
                status: 404,
            }
            .into()
        })
    }
}

#[async_trait]
impl UpstreamRegistry for FakeUpstream {
    async fn list_provider_versions(&self, provider: &Provider) -> UpstreamResult<ProviderVersions> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&provider.to_string()).await?;
        Ok(ProviderVersions {
            versions: self.versions.clone(),
        })
    }

    async fn get_provider(&self, provider: &Provider) -> UpstreamResult<ResolvedProvider> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&provider.to_string()).await?;

        let manifest = self.manifest(provider)?;
        let filename = provider.archive_file_name().unwrap();
        let shasum = ChecksumSet::parse(manifest.as_bytes())
            .unwrap()
            .checksum(&filename)
            .map_err(|e| UpstreamError::application(provider.to_string(), e.to_string()))?;

        Ok(ResolvedProvider {
            provider: provider.clone(),
            download_url: format!("{RELEASES_BASE}/{filename}"),
            shasums_url: format!("{RELEASES_BASE}/{}", provider.shasums_file_name().unwrap()),
            shasums_signature_url: Some(format!(
                "{RELEASES_BASE}/{}",
                provider.shasums_signature_file_name().unwrap()
            )),
            filename,
            shasum,
            signing_keys: SigningKeys {
                gpg_public_keys: vec![GpgPublicKey {
                    key_id: "34365D9472D7468F".into(),
                    ascii_armor: "-----BEGIN PGP PUBLIC KEY BLOCK-----".into(),
                    trust_signature: None,
                    source: Some("HashiCorp".into()),
                    source_url: None,
                }],
            },
        })
    }

    async fn sha256_sums(&self, provider: &Provider) -> UpstreamResult<ChecksumSet> {
        self.sums_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&provider.to_string()).await?;
        if *self.behavior.lock().unwrap() == Behavior::BrokenManifest {
            return Err(UpstreamError::application(
                provider.to_string(),
                "origin returned 500",
            ));
        }
        let manifest = self.manifest(provider)?;
        ChecksumSet::parse(manifest.as_bytes())
            .map_err(|e| UpstreamError::application(provider.to_string(), e.to_string()))
    }

    async fn download(&self, url: &str) -> UpstreamResult<Bytes> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        self.answer(url).await?;

        let file = url
            .strip_prefix(RELEASES_BASE)
            .and_then(|f| f.strip_prefix('/'))
            .ok_or_else(|| UpstreamError::application(url, "unknown URL"))?;

        if file.ends_with("_SHA256SUMS") {
            let version = self
                .manifests
                .keys()
                .find(|v| file.contains(&format!("_{v}_")))
                .ok_or_else(|| UpstreamError::application(url, "no such manifest"))?;
            return Ok(Bytes::from(self.manifests[version].clone()));
        }
        if file.ends_with(".sig") {
            return Ok(Bytes::from_static(b"signature"));
        }
        if self.corrupt_archives {
            return Ok(Bytes::from_static(b"tampered"));
        }
        Ok(archive_bytes(file))
    }
}
