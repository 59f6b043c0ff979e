//! Errors raised while parsing shared types

use thiserror::Error;

/// Failure to interpret user-supplied schema values.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// An algorithm or encoding selector that is not recognised.
    #[error("unsupported {kind} '{name}' (expected one of: {expected})")]
    UnsupportedAlgorithm {
        /// What was being selected, e.g. "checksum algorithm".
        kind: &'static str,
        /// The rejected value.
        name: String,
        /// Comma-separated list of accepted values.
        expected: &'static str,
    },

    /// The release version is not a semantic version.
    #[error("invalid version '{version}': {source}")]
    InvalidVersion {
        /// The rejected input.
        version: String,
        /// Parser failure.
        #[source]
        source: semver::Error,
    },

    /// Text could not be decoded with the selected encoding.
    #[error("invalid {encoding} text: {message}")]
    Decode {
        /// Encoding name.
        encoding: &'static str,
        /// Decoder message.
        message: String,
    },

    /// Metadata must be a JSON object.
    #[error("invalid metadata: {0}")]
    Metadata(String),
}
