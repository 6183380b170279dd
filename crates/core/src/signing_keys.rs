//! GPG signing keys published with provider releases.

use serde::{Deserialize, Serialize};

/// A set of public keys able to verify a release's checksum signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeys {
    #[serde(default)]
    pub gpg_public_keys: Vec<GpgPublicKey>,
}

/// One ASCII-armored GPG public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpgPublicKey {
    pub key_id: String,
    pub ascii_armor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl SigningKeys {
    pub fn is_empty(&self) -> bool {
        self.gpg_public_keys.is_empty()
    }

    /// Add every key from `other` whose key id is not already present.
    ///
    /// Returns `true` when the set changed.
    pub fn merge(&mut self, other: &SigningKeys) -> bool {
        let before = self.gpg_public_keys.len();
        for key in &other.gpg_public_keys {
            if !self.gpg_public_keys.iter().any(|k| k.key_id == key.key_id) {
                self.gpg_public_keys.push(key.clone());
            }
        }
        self.gpg_public_keys.len() != before
    }

    pub fn from_json(data: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(data).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}
