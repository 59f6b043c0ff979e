//! Error taxonomy shared by every shipkey operation

use std::fmt;
use std::path::PathBuf;

use shipkey_schema::SchemaError;
use thiserror::Error;

use crate::api::RemoteError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The step an operation failed in, used for one-line error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading, parsing or writing key material
    Keys,
    /// Selecting algorithms, encodings, versions or metadata
    Config,
    /// Computing a checksum
    Checksum,
    /// Computing a signature
    Signing,
    /// Talking to the release API
    RemoteQuery,
    /// Checking a signature
    Verification,
    /// Replacing the executable
    Install,
    /// The upgrade flow itself
    Upgrade,
}

impl Stage {
    /// Lowercase stage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keys => "keys",
            Self::Config => "config",
            Self::Checksum => "checksum",
            Self::Signing => "signing",
            Self::RemoteQuery => "remote query",
            Self::Verification => "verification",
            Self::Install => "install",
            Self::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by shipkey operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A path could not be expanded, read or created.
    #[error("{}: {reason}", path.display())]
    Path {
        /// Stage that needed the file
        stage: Stage,
        /// Offending path (as given, or expanded when available)
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Key text is not valid hex or has the wrong length.
    #[error("invalid key: {0}")]
    KeyFormat(String),

    /// Unknown algorithm, encoding or channel name.
    #[error("{0}")]
    UnsupportedAlgorithm(String),

    /// Invalid version, metadata or encoded text.
    #[error("{0}")]
    Invalid(String),

    /// The signing context exceeds the Ed25519ph limit of 255 bytes.
    #[error("signing context is {0} bytes, at most 255 are allowed")]
    SignatureContext(usize),

    /// Structured failure reported by the release API.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A signature did not validate.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// The executable could not be replaced.
    #[error("{context}: {message}")]
    Install {
        /// What was being attempted
        context: &'static str,
        /// Underlying failure
        message: String,
    },

    /// The user declined a confirmation. Not a failure.
    #[error("upgrade aborted")]
    UserDeclined,

    /// Reading a stream failed part way through a stage.
    #[error("read failed: {source}")]
    Read {
        /// Stage doing the reading
        stage: Stage,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an install error with context.
    pub fn install(context: &'static str, err: impl fmt::Display) -> Self {
        Self::Install {
            context,
            message: err.to_string(),
        }
    }

    /// Wrap a read failure for `stage`.
    pub fn read(stage: Stage, source: std::io::Error) -> Self {
        Self::Read { stage, source }
    }

    /// Build a path error for a key file.
    pub fn path(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::path_in(Stage::Keys, path, reason)
    }

    /// Build a path error for a file read by `stage`.
    pub fn path_in(stage: Stage, path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Path {
            stage,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Report a path error under `stage` instead. Other errors are unchanged.
    #[must_use]
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Self::Path { path, reason, .. } => Self::Path {
                stage,
                path,
                reason,
            },
            other => other,
        }
    }

    /// Stage this error is reported under.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Path { stage, .. } | Self::Read { stage, .. } => *stage,
            Self::KeyFormat(_) => Stage::Keys,
            Self::UnsupportedAlgorithm(_) | Self::Invalid(_) => Stage::Config,
            Self::SignatureContext(_) => Stage::Signing,
            Self::Remote(_) => Stage::RemoteQuery,
            Self::VerificationFailed(_) => Stage::Verification,
            Self::Install { .. } => Stage::Install,
            Self::UserDeclined => Stage::Upgrade,
        }
    }

    /// `false` for outcomes that should not produce a failing exit status.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::UserDeclined)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnsupportedAlgorithm { .. } => Self::UnsupportedAlgorithm(err.to_string()),
            other => Self::Invalid(other.to_string()),
        }
    }
}
