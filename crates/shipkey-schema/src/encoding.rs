//! Text encodings for digests and signatures.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};
use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// How binary digests and signatures are rendered as text.
///
/// Checksums and signatures pick their encoding independently; a consumer
/// must be told which one was used for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Standard alphabet, padded.
    Base64,
    /// Standard alphabet, no padding.
    #[default]
    Base64Raw,
    /// URL-safe alphabet, padded.
    Base64Url,
    /// Lowercase hex.
    Hex,
}

impl Encoding {
    /// Accepted selector values.
    pub const NAMES: &'static str = "base64, base64raw, base64url, hex";

    /// Every supported encoding.
    pub const ALL: [Encoding; 4] = [Self::Base64, Self::Base64Raw, Self::Base64Url, Self::Hex];

    /// Selector name as used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Base64Raw => "base64raw",
            Self::Base64Url => "base64url",
            Self::Hex => "hex",
        }
    }

    /// Render `bytes` as text.
    pub fn encode(&self, bytes: impl AsRef<[u8]>) -> String {
        match self {
            Self::Base64 => STANDARD.encode(bytes),
            Self::Base64Raw => STANDARD_NO_PAD.encode(bytes),
            Self::Base64Url => URL_SAFE.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }

    /// Parse text produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Decode`] if the text is not valid for this encoding.
    pub fn decode(&self, text: &str) -> Result<Vec<u8>, SchemaError> {
        let text = text.trim();
        let decoded = match self {
            Self::Base64 => STANDARD.decode(text).map_err(|e| e.to_string()),
            Self::Base64Raw => STANDARD_NO_PAD.decode(text).map_err(|e| e.to_string()),
            Self::Base64Url => URL_SAFE.decode(text).map_err(|e| e.to_string()),
            Self::Hex => hex::decode(text).map_err(|e| e.to_string()),
        };
        decoded.map_err(|message| SchemaError::Decode {
            encoding: self.as_str(),
            message,
        })
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "base64raw" => Ok(Self::Base64Raw),
            "base64url" => Ok(Self::Base64Url),
            "hex" => Ok(Self::Hex),
            _ => Err(SchemaError::UnsupportedAlgorithm {
                kind: "encoding",
                name: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}
