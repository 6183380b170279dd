//! Provider coordinates and the release filenames derived from them.
//!
//! A [`Provider`] is an immutable value. Narrowing a coordinate to a version
//! or a platform produces a new value, so probing an alternate platform never
//! changes a coordinate held elsewhere.

use crate::hash::Sha256Digest;
use crate::signing_keys::SigningKeys;
use serde::{Deserialize, Serialize};

const FILE_PREFIX: &str = "terraform-provider-";
const ARCHIVE_SUFFIX: &str = ".zip";

/// A provider coordinate: hostname/namespace/name, optionally narrowed to a
/// version and an (os, arch) platform.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Provider {
    hostname: String,
    namespace: String,
    name: String,
    version: Option<String>,
    platform: Option<Platform>,
}

impl Provider {
    /// Create a coordinate for all versions of `hostname/namespace/name`.
    pub fn new(
        hostname: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            namespace: namespace.into(),
            name: name.into(),
            version: None,
            platform: None,
        }
    }

    /// Return a copy narrowed to `version`. The platform is kept.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..self.clone()
        }
    }

    /// Return a copy addressing the `os`/`arch` build of this coordinate.
    pub fn with_platform(&self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            platform: Some(Platform::new(os, arch)),
            ..self.clone()
        }
    }

    /// Parse an archive filename such as
    /// `terraform-provider-abbey_0.2.6_darwin_arm64.zip` into a coordinate
    /// under `hostname/namespace`.
    ///
    /// Fields are split from the right so names containing `_` still parse.
    pub fn from_archive_file_name(
        hostname: &str,
        namespace: &str,
        file_name: &str,
    ) -> crate::Result<Self> {
        let invalid = || crate::Error::InvalidArchiveName(file_name.to_string());

        let stem = file_name
            .strip_prefix(FILE_PREFIX)
            .and_then(|s| s.strip_suffix(ARCHIVE_SUFFIX))
            .ok_or_else(invalid)?;

        let mut parts = stem.rsplitn(4, '_');
        let arch = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let os = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let version = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

        Ok(Self::new(hostname, namespace, name)
            .with_version(version)
            .with_platform(os, arch))
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    pub fn os(&self) -> Option<&str> {
        self.platform.as_ref().map(|p| p.os.as_str())
    }

    pub fn arch(&self) -> Option<&str> {
        self.platform.as_ref().map(|p| p.arch.as_str())
    }

    /// Check the fields every operation needs: hostname, namespace and name.
    pub fn validate(&self) -> crate::Result<()> {
        for (field, value) in [
            ("hostname", &self.hostname),
            ("namespace", &self.namespace),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::InvalidProvider(format!("{field} is required")));
            }
            if value.contains('/') || value.contains("..") {
                return Err(crate::Error::InvalidProvider(format!(
                    "{field} contains invalid characters: {value}"
                )));
            }
        }
        Ok(())
    }

    /// Validate and return the version.
    pub fn require_version(&self) -> crate::Result<&str> {
        self.validate()?;
        match self.version.as_deref() {
            Some(v) if !v.trim().is_empty() && !v.contains('/') => Ok(v),
            Some(v) if !v.trim().is_empty() => Err(crate::Error::InvalidProvider(format!(
                "version contains invalid characters: {v}"
            ))),
            _ => Err(crate::Error::InvalidProvider("version is required".into())),
        }
    }

    /// Validate and return the version and platform.
    pub fn require_platform(&self) -> crate::Result<(&str, &Platform)> {
        let version = self.require_version()?;
        match &self.platform {
            Some(p) if !p.os.trim().is_empty() && !p.arch.trim().is_empty() => {
                if p.os.contains('/') || p.arch.contains('/') {
                    return Err(crate::Error::InvalidProvider(format!(
                        "platform contains invalid characters: {}",
                        p.key()
                    )));
                }
                Ok((version, p))
            }
            _ => Err(crate::Error::InvalidProvider("os and arch are required".into())),
        }
    }

    /// `terraform-provider-<name>_<version>_<os>_<arch>.zip`
    pub fn archive_file_name(&self) -> crate::Result<String> {
        let (version, platform) = self.require_platform()?;
        Ok(format!(
            "{FILE_PREFIX}{}_{version}_{}_{}{ARCHIVE_SUFFIX}",
            self.name, platform.os, platform.arch
        ))
    }

    /// `terraform-provider-<name>_<version>_SHA256SUMS`
    pub fn shasums_file_name(&self) -> crate::Result<String> {
        let version = self.require_version()?;
        Ok(format!("{FILE_PREFIX}{}_{version}_SHA256SUMS", self.name))
    }

    /// `terraform-provider-<name>_<version>_SHA256SUMS.sig`
    pub fn shasums_signature_file_name(&self) -> crate::Result<String> {
        Ok(format!("{}.sig", self.shasums_file_name()?))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.namespace, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        if let Some(platform) = &self.platform {
            write!(f, " ({})", platform.key())?;
        }
        Ok(())
    }
}

/// An (os, arch) pair advertised for a provider version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Key used in installation package listings, e.g. `darwin_arm64`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

/// One version entry from the origin's version listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderVersion {
    pub version: String,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

/// The origin's version listing for one namespace/name, in origin order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderVersions {
    #[serde(default)]
    pub versions: Vec<ProviderVersion>,
}

impl ProviderVersions {
    /// Find the entry for an exact version string.
    pub fn find(&self, version: &str) -> Option<&ProviderVersion> {
        self.versions.iter().find(|v| v.version == version)
    }
}

/// A platform build fully resolved against the origin registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub provider: Provider,
    pub filename: String,
    pub download_url: String,
    pub shasums_url: String,
    pub shasums_signature_url: Option<String>,
    /// Digest of the archive as listed in the release manifest.
    pub shasum: Sha256Digest,
    pub signing_keys: SigningKeys,
}

/// A platform build present in the mirror store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirroredProvider {
    pub provider: Provider,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abbey() -> Provider {
        Provider::new("registry.terraform.io", "abbeylabs", "abbey")
    }

    #[test]
    fn test_derived_file_names() {
        let p = abbey().with_version("0.2.6").with_platform("darwin", "arm64");
        assert_eq!(
            p.archive_file_name().unwrap(),
            "terraform-provider-abbey_0.2.6_darwin_arm64.zip"
        );
        assert_eq!(
            p.shasums_file_name().unwrap(),
            "terraform-provider-abbey_0.2.6_SHA256SUMS"
        );
        assert_eq!(
            p.shasums_signature_file_name().unwrap(),
            "terraform-provider-abbey_0.2.6_SHA256SUMS.sig"
        );
    }

    #[test]
    fn test_with_platform_leaves_original_untouched() {
        let original = abbey().with_version("0.2.6").with_platform("darwin", "arm64");
        let probe = original.with_platform("linux", "amd64");

        assert_eq!(original.os(), Some("darwin"));
        assert_eq!(original.arch(), Some("arm64"));
        assert_eq!(probe.os(), Some("linux"));
        assert_eq!(probe.version(), Some("0.2.6"));
        assert_ne!(original, probe);
    }

    #[test]
    fn test_validation_failures() {
        assert!(Provider::new("h", "", "abbey").validate().is_err());
        assert!(Provider::new("h", "abbeylabs", " ").validate().is_err());
        assert!(Provider::new("", "abbeylabs", "abbey").validate().is_err());
        assert!(Provider::new("h", "../etc", "abbey").validate().is_err());

        let no_version = abbey();
        assert!(no_version.require_version().is_err());
        assert!(no_version.with_version("").require_version().is_err());

        let no_platform = abbey().with_version("0.2.6");
        assert!(no_platform.require_platform().is_err());
        assert!(no_platform.with_platform("", "amd64").require_platform().is_err());
        assert!(no_platform.archive_file_name().is_err());
    }

    #[test]
    fn test_from_archive_file_name() {
        let p = Provider::from_archive_file_name(
            "registry.terraform.io",
            "hashicorp",
            "terraform-provider-google_beta_4.0.0-rc.2_linux_amd64.zip",
        )
        .unwrap();
        assert_eq!(p.name(), "google_beta");
        assert_eq!(p.version(), Some("4.0.0-rc.2"));
        assert_eq!(p.os(), Some("linux"));
        assert_eq!(p.arch(), Some("amd64"));
        assert_eq!(p.namespace(), "hashicorp");
    }

    #[test]
    fn test_from_archive_file_name_rejects_other_files() {
        for name in [
            "terraform-provider-abbey_0.2.6_SHA256SUMS",
            "terraform-provider-abbey_0.2.6_SHA256SUMS.sig",
            "terraform-provider-abbey_linux_amd64.zip",
            "abbey_0.2.6_linux_amd64.zip",
            "signing-keys.json",
        ] {
            assert!(
                Provider::from_archive_file_name("h", "ns", name).is_err(),
                "{name} should not parse"
            );
        }
    }

    #[test]
    fn test_provider_versions_deserialize() {
        let json = r#"{
            "versions": [
                {"version": "0.2.6", "protocols": ["5.0"],
                 "platforms": [{"os": "darwin", "arch": "arm64"}, {"os": "linux", "arch": "amd64"}]},
                {"version": "0.2.5"}
            ]
        }"#;
        let versions: ProviderVersions = serde_json::from_str(json).unwrap();
        assert_eq!(versions.versions.len(), 2);
        assert_eq!(versions.find("0.2.6").unwrap().platforms[1].key(), "linux_amd64");
        assert!(versions.find("0.2.5").unwrap().platforms.is_empty());
        assert!(versions.find("9.9.9").is_none());
    }

    #[test]
    fn test_display() {
        let p = abbey().with_version("0.2.6").with_platform("darwin", "arm64");
        assert_eq!(
            p.to_string(),
            "registry.terraform.io/abbeylabs/abbey@0.2.6 (darwin_arm64)"
        );
    }
}
