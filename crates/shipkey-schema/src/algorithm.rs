//! Checksum and signing algorithm selectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Hash used for artifact checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumAlgorithm {
    /// SHA-512 (64-byte digest)
    #[default]
    #[serde(rename = "sha-512")]
    Sha512,
    /// SHA-256 (32-byte digest)
    #[serde(rename = "sha-256")]
    Sha256,
    /// SHA-1 (20-byte digest). Kept for legacy consumers.
    #[serde(rename = "sha-1")]
    Sha1,
}

impl ChecksumAlgorithm {
    /// Accepted selector values.
    pub const NAMES: &'static str = "sha-512, sha-256, sha-1";

    /// Selector name as used on the command line and the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha512 => "sha-512",
            Self::Sha256 => "sha-256",
            Self::Sha1 => "sha-1",
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha512 => 64,
            Self::Sha256 => 32,
            Self::Sha1 => 20,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha-512" | "sha512" => Ok(Self::Sha512),
            "sha-256" | "sha256" => Ok(Self::Sha256),
            "sha-1" | "sha1" => Ok(Self::Sha1),
            _ => Err(SchemaError::UnsupportedAlgorithm {
                kind: "checksum algorithm",
                name: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

/// Ed25519 signing mode.
///
/// The mode is not recoverable from the signature bytes, so it always
/// travels next to the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlgorithm {
    /// Ed25519ph: sign the SHA-512 digest of the content, bound to a context.
    #[default]
    Ed25519ph,
    /// Plain Ed25519 over the raw content. Requires the whole file in memory.
    Ed25519,
}

impl SigningAlgorithm {
    /// Accepted selector values.
    pub const NAMES: &'static str = "ed25519ph, ed25519";

    /// Selector name as used on the command line and the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519ph => "ed25519ph",
            Self::Ed25519 => "ed25519",
        }
    }

    /// Whether the content is hashed before signing.
    pub fn is_prehashed(&self) -> bool {
        matches!(self, Self::Ed25519ph)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519ph" => Ok(Self::Ed25519ph),
            "ed25519" => Ok(Self::Ed25519),
            _ => Err(SchemaError::UnsupportedAlgorithm {
                kind: "signing algorithm",
                name: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_names() {
        assert_eq!(
            "sha-512".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Sha512
        );
        assert_eq!(
            "SHA-256".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Sha256
        );
        assert_eq!(
            "sha1".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Sha1
        );
        assert_eq!(ChecksumAlgorithm::default(), ChecksumAlgorithm::Sha512);
    }

    #[test]
    fn test_unsupported_checksum_is_reported() {
        let err = "md5".parse::<ChecksumAlgorithm>().unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedAlgorithm { .. }));
        assert!(err.to_string().contains("md5"));
        assert!(err.to_string().contains("sha-512"));
    }

    #[test]
    fn test_signing_names() {
        assert_eq!(
            "ed25519ph".parse::<SigningAlgorithm>().unwrap(),
            SigningAlgorithm::Ed25519ph
        );
        assert_eq!(
            "ED25519".parse::<SigningAlgorithm>().unwrap(),
            SigningAlgorithm::Ed25519
        );
        assert!("rsa".parse::<SigningAlgorithm>().is_err());
        assert!(SigningAlgorithm::default().is_prehashed());
    }
}
