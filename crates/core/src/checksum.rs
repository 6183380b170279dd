//! Checksum manifests (`SHA256SUMS`) published with every provider release.
//!
//! A manifest is plain text with one `<64 hex chars> <filename>` entry per
//! line. One manifest covers every platform archive of a single version.

use crate::hash::Sha256Digest;
use std::collections::BTreeMap;

/// Prefix for locally computed archive hashes in the mirror protocol.
pub const ZH_HASH_PREFIX: &str = "zh:";

/// Parsed checksum manifest: archive filename to SHA-256 digest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChecksumSet {
    entries: BTreeMap<String, Sha256Digest>,
}

impl ChecksumSet {
    /// Parse a raw manifest.
    ///
    /// Blank lines are skipped. Any other line must contain exactly a digest
    /// and a filename separated by whitespace. A filename listed twice with
    /// different digests is rejected.
    pub fn parse(data: &[u8]) -> crate::Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| crate::Error::ChecksumParse(format!("manifest is not UTF-8: {e}")))?;

        let mut entries = BTreeMap::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(digest), Some(filename), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(crate::Error::ChecksumParse(format!(
                    "line {}: expected '<sha256> <filename>', got: {line}",
                    index + 1
                )));
            };

            let digest = Sha256Digest::from_hex(digest).map_err(|e| {
                crate::Error::ChecksumParse(format!("line {}: {e}", index + 1))
            })?;

            if let Some(existing) = entries.insert(filename.to_string(), digest)
                && existing != digest
            {
                return Err(crate::Error::ChecksumParse(format!(
                    "line {}: conflicting digests for {filename}",
                    index + 1
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Look up the digest for an exact filename.
    pub fn checksum(&self, filename: &str) -> crate::Result<Sha256Digest> {
        self.entries
            .get(filename)
            .copied()
            .ok_or_else(|| crate::Error::ChecksumNotFound(filename.to_string()))
    }

    /// Look up a filename and format its digest as a `zh:` hash string.
    pub fn zh_hash(&self, filename: &str) -> crate::Result<String> {
        Ok(self.checksum(filename)?.to_zh_hash())
    }

    /// Number of entries in the manifest.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
