//! Shared types for shipkey.
//!
//! Everything in here is plain data: channels, algorithm selectors, text
//! encodings and the descriptors sent to the release API. Nothing in this
//! crate touches the network or the filesystem.

pub mod algorithm;
pub mod channel;
pub mod encoding;
pub mod error;
pub mod platform;
pub mod release;

// Re-exports
pub use algorithm::*;
pub use channel::Channel;
pub use encoding::Encoding;
pub use error::SchemaError;
pub use platform::{current_arch, current_platform};
pub use release::{
    ArtifactDescriptor, ReleaseDescriptor, filetype_for, parse_metadata, parse_version,
};
