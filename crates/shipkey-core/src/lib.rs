//! Core library for shipkey.
//!
//! - [`keys`] and [`keygen`]: Ed25519 key pairs and their hex file format
//! - [`checksum`]: streaming digests in a selectable encoding
//! - [`signature`]: detached Ed25519ph / Ed25519 signatures
//! - [`upgrade`]: rate-limited, verified, atomic self-upgrade
//! - [`api`]: the release API collaborator (JSON:API over reqwest)
//!
//! Crypto, checksum and install code is synchronous. Only the network
//! collaborator is async.

pub mod api;
pub mod checksum;
pub mod error;
pub mod keygen;
pub mod keys;
pub mod paths;
pub mod progress;
pub mod signature;
pub mod upgrade;

pub use error::{Error, Result, Stage};
pub use keys::{KeyCodec, KeyKind, SigningKey, VerifyKey};
pub use progress::{NullProgress, Progress, ProgressStage};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("shipkey/", env!("CARGO_PKG_VERSION"));
