//! Detached Ed25519 signatures over files.
//!
//! Two modes, never mixed:
//!
//! - [`SigningAlgorithm::Ed25519ph`]: SHA-512 over the content in bounded
//!   chunks, then an RFC 8032 Ed25519ph signature over the digest. An
//!   optional context (at most 255 bytes) is bound into the signature and
//!   must match on verification. An absent context equals an empty one.
//! - [`SigningAlgorithm::Ed25519`]: plain Ed25519 over the raw content. The
//!   whole file is read into memory. No context is bound.
//!
//! Streams are read from offset 0 and left at offset 0.

use std::io::{Read, Seek};

use ed25519_dalek::{Signature, Signer, Verifier};
use sha2::{Digest, Sha512};
use shipkey_schema::{Encoding, SigningAlgorithm};
use tracing::{debug, warn};

use crate::checksum::{feed, finish_rewound};
use crate::progress::{NullProgress, Progress, ProgressStage};
use crate::{Error, Result, SigningKey, Stage, VerifyKey};

/// Ed25519ph context limit from RFC 8032.
pub const MAX_CONTEXT_LEN: usize = 255;

/// Plain-mode inputs above this size trigger a warning.
pub const PLAIN_MODE_WARN_BYTES: u64 = 10 * 1024 * 1024;

/// Parameters shared by signing and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParams<'a> {
    /// Signing mode
    pub algorithm: SigningAlgorithm,
    /// Context bound into Ed25519ph signatures
    pub context: Option<&'a str>,
    /// Text encoding of the signature
    pub encoding: Encoding,
}

impl<'a> SignatureParams<'a> {
    /// Ed25519ph with the given context, base64raw encoded.
    pub fn prehashed(context: Option<&'a str>) -> Self {
        Self {
            algorithm: SigningAlgorithm::Ed25519ph,
            context,
            encoding: Encoding::default(),
        }
    }

    /// Override the mode.
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Override the encoding.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    fn context_bytes(&self) -> Result<Option<&'a [u8]>> {
        match (self.algorithm, self.context) {
            (SigningAlgorithm::Ed25519ph, Some(ctx)) if ctx.len() > MAX_CONTEXT_LEN => {
                Err(Error::SignatureContext(ctx.len()))
            }
            (SigningAlgorithm::Ed25519ph, ctx) => Ok(ctx.map(str::as_bytes)),
            (SigningAlgorithm::Ed25519, Some(_)) => {
                debug!("context ignored in plain ed25519 mode");
                Ok(None)
            }
            (SigningAlgorithm::Ed25519, None) => Ok(None),
        }
    }
}

impl Default for SignatureParams<'_> {
    fn default() -> Self {
        Self::prehashed(None)
    }
}

/// Sign the stream and return the encoded signature.
///
/// # Errors
///
/// Returns [`Error::SignatureContext`] for an oversized context and
/// [`Error::Read`] if the stream cannot be read.
pub fn sign<R: Read + Seek>(
    reader: &mut R,
    key: &SigningKey,
    params: SignatureParams<'_>,
) -> Result<String> {
    sign_with_progress(reader, key, params, &NullProgress)
}

/// [`sign`] with a signing key given as raw bytes.
///
/// The key length is checked before the stream is touched.
///
/// # Errors
///
/// Returns [`Error::KeyFormat`] for a malformed key, otherwise as [`sign`].
pub fn sign_with_key_bytes<R: Read + Seek>(
    reader: &mut R,
    key: &[u8],
    params: SignatureParams<'_>,
) -> Result<String> {
    let key = SigningKey::from_bytes(key)?;
    sign(reader, &key, params)
}

/// [`sign`], reporting bytes read to `progress`.
///
/// # Errors
///
/// As [`sign`].
pub fn sign_with_progress<R: Read + Seek>(
    reader: &mut R,
    key: &SigningKey,
    params: SignatureParams<'_>,
    progress: &dyn Progress,
) -> Result<String> {
    let context = params.context_bytes()?;
    let signer = key.to_dalek();

    let signature = match params.algorithm {
        SigningAlgorithm::Ed25519ph => {
            let prehash = prehash(reader, ProgressStage::Signing, progress)?;
            signer
                .sign_prehashed(prehash, context)
                .map_err(|_| Error::SignatureContext(context.map_or(0, <[u8]>::len)))?
        }
        SigningAlgorithm::Ed25519 => {
            let content = read_all(reader, ProgressStage::Signing, progress)?;
            signer.sign(&content)
        }
    };

    Ok(params.encoding.encode(signature.to_bytes()))
}

/// Check an encoded signature against the stream.
///
/// A mismatch of key, mode, context or content yields `Ok(false)`, as does a
/// signature text that does not decode to 64 bytes.
///
/// # Errors
///
/// Returns [`Error::Read`] if the stream cannot be read, and
/// [`Error::KeyFormat`] if `key` is not usable.
pub fn verify<R: Read + Seek>(
    reader: &mut R,
    key: &VerifyKey,
    signature: &str,
    params: SignatureParams<'_>,
) -> Result<bool> {
    verify_with_progress(reader, key, signature, params, &NullProgress)
}

/// [`verify`], reporting bytes read to `progress`.
///
/// # Errors
///
/// As [`verify`].
pub fn verify_with_progress<R: Read + Seek>(
    reader: &mut R,
    key: &VerifyKey,
    signature: &str,
    params: SignatureParams<'_>,
    progress: &dyn Progress,
) -> Result<bool> {
    let verifier = key.to_dalek()?;
    let Some(signature) = decode_signature(signature, params.encoding) else {
        return Ok(false);
    };
    let Ok(context) = params.context_bytes() else {
        return Ok(false);
    };

    let valid = match params.algorithm {
        SigningAlgorithm::Ed25519ph => {
            let prehash = prehash(reader, ProgressStage::Verify, progress)?;
            verifier
                .verify_prehashed(prehash, context, &signature)
                .is_ok()
        }
        SigningAlgorithm::Ed25519 => {
            let content = read_all(reader, ProgressStage::Verify, progress)?;
            verifier.verify(&content, &signature).is_ok()
        }
    };
    Ok(valid)
}

/// Verify an Ed25519ph signature against a SHA-512 state the caller has
/// already fed.
///
/// # Errors
///
/// Returns [`Error::KeyFormat`] if `key` is not usable.
pub fn verify_digest(
    prehash: Sha512,
    key: &VerifyKey,
    signature: &str,
    context: Option<&str>,
    encoding: Encoding,
) -> Result<bool> {
    let verifier = key.to_dalek()?;
    let Some(signature) = decode_signature(signature, encoding) else {
        return Ok(false);
    };
    if context.is_some_and(|c| c.len() > MAX_CONTEXT_LEN) {
        return Ok(false);
    }
    Ok(verifier
        .verify_prehashed(prehash, context.map(str::as_bytes), &signature)
        .is_ok())
}

fn decode_signature(text: &str, encoding: Encoding) -> Option<Signature> {
    match encoding.decode(text) {
        Ok(bytes) => Signature::from_slice(&bytes).ok(),
        Err(e) => {
            debug!("undecodable signature: {e}");
            None
        }
    }
}

fn prehash<R: Read + Seek>(
    reader: &mut R,
    stage: ProgressStage,
    progress: &dyn Progress,
) -> Result<Sha512> {
    let mut hasher = Sha512::new();
    let result = feed(reader, &mut hasher, stage, progress);
    finish_rewound(reader, stage_for(stage), result)?;
    Ok(hasher)
}

fn read_all<R: Read + Seek>(
    reader: &mut R,
    stage: ProgressStage,
    progress: &dyn Progress,
) -> Result<Vec<u8>> {
    let result = read_from_start(reader);
    let content = finish_rewound(reader, stage_for(stage), result)?;

    let size = content.len() as u64;
    if size > PLAIN_MODE_WARN_BYTES {
        warn!(
            size,
            "plain ed25519 buffers the whole file in memory; ed25519ph is recommended"
        );
    }
    progress.on_progress(stage, size, Some(size));
    Ok(content)
}

fn read_from_start<R: Read + Seek>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    reader.rewind()?;
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    Ok(content)
}

fn stage_for(stage: ProgressStage) -> Stage {
    match stage {
        ProgressStage::Verify => Stage::Verification,
        _ => Stage::Signing,
    }
}
