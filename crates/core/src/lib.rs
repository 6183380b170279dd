//! Core domain types and shared logic for the depot provider mirror.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Provider coordinates and the filenames derived from them
//! - Checksum manifests (`SHA256SUMS`) and `zh:` hash strings
//! - Signing key sets published alongside provider releases
//! - Application configuration

pub mod checksum;
pub mod config;
pub mod error;
pub mod hash;
pub mod provider;
pub mod signing_keys;

pub use checksum::{ChecksumSet, ZH_HASH_PREFIX};
pub use error::{Error, Result};
pub use hash::Sha256Digest;
pub use provider::{
    MirroredProvider, Platform, Provider, ProviderVersion, ProviderVersions, ResolvedProvider,
};
pub use signing_keys::{GpgPublicKey, SigningKeys};

/// Default deadline for a single call to the origin registry.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
