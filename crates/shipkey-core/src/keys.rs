//! Ed25519 key material and its hex text format.
//!
//! A signing key file holds the hex of 64 bytes (32-byte seed followed by
//! the 32-byte public key). A verify key file holds the hex of the 32-byte
//! public key. No header, no terminator; surrounding whitespace is ignored
//! on read.
//!
//! [`SigningKey`] and [`VerifyKey`] are the only key types used outside this
//! module. Conversions to `ed25519_dalek` types stay in here.

use std::fmt;
use std::path::Path;

use crate::{Error, Result, paths};

/// Which kind of key a text is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// 64-byte seed ‖ public key
    Signing,
    /// 32-byte public key
    Verify,
}

impl KeyKind {
    /// Raw byte length of this key kind.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Signing => SigningKey::LEN,
            Self::Verify => VerifyKey::LEN,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Signing => "signing key",
            Self::Verify => "verify key",
        }
    }
}

/// Hex codec for key files.
#[derive(Debug, Clone, Copy)]
pub struct KeyCodec;

impl KeyCodec {
    /// Encode raw key bytes as lowercase hex.
    pub fn encode(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }

    /// Decode hex text, requiring exactly `kind.byte_len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFormat`] for invalid hex or a wrong length.
    pub fn decode(text: &str, kind: KeyKind) -> Result<Vec<u8>> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| Error::KeyFormat(format!("{} is not valid hex: {e}", kind.label())))?;
        if bytes.len() != kind.byte_len() {
            return Err(Error::KeyFormat(format!(
                "{} must be {} bytes, got {}",
                kind.label(),
                kind.byte_len(),
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

/// Ed25519 signing key in its 64-byte wire layout.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    seed: [u8; 32],
    public: [u8; 32],
}

impl SigningKey {
    /// Raw length in bytes.
    pub const LEN: usize = 64;

    /// Derive the key pair for a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let public = ed25519_dalek::SigningKey::from_bytes(&seed)
            .verifying_key()
            .to_bytes();
        Self { seed, public }
    }

    /// Parse the 64-byte layout, checking the public half matches the seed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFormat`] for a wrong length or mismatched halves.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: &[u8; 64] = bytes.try_into().map_err(|_| {
            Error::KeyFormat(format!(
                "signing key must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        ed25519_dalek::SigningKey::from_keypair_bytes(raw).map_err(|_| {
            Error::KeyFormat("signing key public half does not match its seed".into())
        })?;

        let mut seed = [0u8; 32];
        let mut public = [0u8; 32];
        seed.copy_from_slice(&raw[..32]);
        public.copy_from_slice(&raw[32..]);
        Ok(Self { seed, public })
    }

    /// Parse hex text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFormat`] if the text is not a valid signing key.
    pub fn from_hex(text: &str) -> Result<Self> {
        Self::from_bytes(&KeyCodec::decode(text, KeyKind::Signing)?)
    }

    /// Seed followed by public key.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.seed);
        out[32..].copy_from_slice(&self.public);
        out
    }

    /// Hex text as written to key files.
    pub fn to_hex(&self) -> String {
        KeyCodec::encode(&self.to_bytes())
    }

    /// Public half.
    pub fn verify_key(&self) -> VerifyKey {
        VerifyKey { bytes: self.public }
    }

    pub(crate) fn to_dalek(&self) -> ed25519_dalek::SigningKey {
        ed25519_dalek::SigningKey::from_bytes(&self.seed)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("public", &KeyCodec::encode(&self.public))
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerifyKey {
    bytes: [u8; 32],
}

impl VerifyKey {
    /// Raw length in bytes.
    pub const LEN: usize = 32;

    /// Parse 32 raw bytes, rejecting values that are not curve points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFormat`] for a wrong length or invalid point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::KeyFormat(format!(
                "verify key must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        ed25519_dalek::VerifyingKey::from_bytes(&raw)
            .map_err(|_| Error::KeyFormat("verify key is not a valid Ed25519 point".into()))?;
        Ok(Self { bytes: raw })
    }

    /// Parse hex text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFormat`] if the text is not a valid verify key.
    pub fn from_hex(text: &str) -> Result<Self> {
        Self::from_bytes(&KeyCodec::decode(text, KeyKind::Verify)?)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex text as written to key files.
    pub fn to_hex(&self) -> String {
        KeyCodec::encode(&self.bytes)
    }

    pub(crate) fn to_dalek(self) -> Result<ed25519_dalek::VerifyingKey> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.bytes)
            .map_err(|_| Error::KeyFormat("verify key is not a valid Ed25519 point".into()))
    }
}

impl fmt::Debug for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyKey({})", self.to_hex())
    }
}

impl fmt::Display for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Load a signing key from a file or inline hex. The file wins when both
/// are given; `None` when neither is.
///
/// # Errors
///
/// Returns [`Error::Path`] if the file cannot be read and
/// [`Error::KeyFormat`] if the contents are not a signing key.
pub fn load_signing_key(path: Option<&Path>, inline: Option<&str>) -> Result<Option<SigningKey>> {
    if let Some(path) = path {
        let path = paths::existing_file(path)?;
        let text = std::fs::read_to_string(&path).map_err(|e| Error::path(&path, e))?;
        return SigningKey::from_hex(&text).map(Some);
    }
    inline.map(SigningKey::from_hex).transpose()
}

/// Load a verify key from a file path.
///
/// # Errors
///
/// Returns [`Error::Path`] or [`Error::KeyFormat`].
pub fn load_verify_key(path: &Path) -> Result<VerifyKey> {
    let path = paths::existing_file(path)?;
    let text = std::fs::read_to_string(&path).map_err(|e| Error::path(&path, e))?;
    VerifyKey::from_hex(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed_byte: u8) -> SigningKey {
        SigningKey::from_seed([seed_byte; 32])
    }

    #[test]
    fn test_codec_round_trip() {
        for kind in [KeyKind::Verify, KeyKind::Signing] {
            let bytes: Vec<u8> = (0..kind.byte_len()).map(|i| i as u8 ^ 0xa5).collect();
            let text = KeyCodec::encode(&bytes);
            assert_eq!(KeyCodec::decode(&text, kind).unwrap(), bytes);
        }
    }

    #[test]
    fn test_codec_rejects_wrong_length() {
        for n in [0usize, 31, 33, 63, 65] {
            let text = KeyCodec::encode(&vec![7u8; n]);
            assert!(matches!(
                KeyCodec::decode(&text, KeyKind::Verify),
                Err(Error::KeyFormat(_))
            ));
            assert!(matches!(
                KeyCodec::decode(&text, KeyKind::Signing),
                Err(Error::KeyFormat(_))
            ));
        }
    }

    #[test]
    fn test_codec_rejects_bad_hex() {
        assert!(matches!(
            KeyCodec::decode("not hex at all", KeyKind::Verify),
            Err(Error::KeyFormat(_))
        ));
    }

    #[test]
    fn test_signing_key_layout() {
        let sk = key(3);
        let bytes = sk.to_bytes();
        assert_eq!(&bytes[32..], sk.verify_key().as_bytes());
        assert_eq!(SigningKey::from_bytes(&bytes).unwrap(), sk);
        assert_eq!(SigningKey::from_hex(&format!("{}\n", sk.to_hex())).unwrap(), sk);
    }

    #[test]
    fn test_signing_key_rejects_mismatched_public_half() {
        let mut bytes = key(1).to_bytes();
        bytes[32..].copy_from_slice(key(2).verify_key().as_bytes());
        assert!(matches!(
            SigningKey::from_bytes(&bytes),
            Err(Error::KeyFormat(_))
        ));
    }

    #[test]
    fn test_debug_hides_seed() {
        let sk = key(9);
        let dbg = format!("{sk:?}");
        assert!(!dbg.contains(&hex::encode([9u8; 32])));
    }

    #[test]
    fn test_load_signing_key_prefers_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.key");
        std::fs::write(&path, key(4).to_hex()).unwrap();

        let loaded = load_signing_key(Some(&path), Some(&key(5).to_hex()))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, key(4));

        let inline = load_signing_key(None, Some(&key(5).to_hex())).unwrap().unwrap();
        assert_eq!(inline, key(5));

        assert!(load_signing_key(None, None).unwrap().is_none());
    }

    #[test]
    fn test_load_missing_key_is_path_error() {
        let err = load_verify_key(Path::new("/definitely/not/here.pub")).unwrap_err();
        assert!(matches!(err, Error::Path { .. }));
    }
}
