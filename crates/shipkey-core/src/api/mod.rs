//! Release API collaborator.
//!
//! The rest of the crate only depends on the [`ReleaseIndex`] and
//! [`ReleasePublisher`] traits. [`HttpReleaseApi`] implements both against a
//! JSON:API server; tests substitute in-memory fakes.

mod client;
mod document;
mod error;
mod resource;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use shipkey_schema::{ArtifactDescriptor, Channel, ReleaseDescriptor};

use crate::progress::Progress;

pub use client::{ClientConfig, DEFAULT_HOST, HttpReleaseApi};
pub use document::Record;
pub use error::RemoteError;
pub use resource::{ArtifactRef, ReleaseRef, Resource, ResourceKind};

/// What the upgrade check asks the index for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeQuery {
    /// Version of the running binary
    pub current_version: String,
    /// Channel to look in
    pub channel: Channel,
    /// Platform name, e.g. `linux`
    pub platform: String,
    /// Architecture name, e.g. `amd64`
    pub arch: String,
}

/// A newer release offered by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCandidate {
    /// Release identifier
    pub release_id: String,
    /// Release version
    pub version: semver::Version,
    /// Release channel
    pub channel: Channel,
    /// Artifact file name
    pub filename: String,
    /// Where the binary is downloaded from
    pub download_url: String,
    /// Detached signature published with the artifact
    pub signature: Option<String>,
}

/// Where and how to upload an artifact's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Artifact identifier, when the server returned one
    pub artifact_id: Option<String>,
    /// Pre-signed upload URL
    pub url: String,
    /// Content type the upload must carry
    pub content_type: String,
}

/// Read side used by the upgrade flow.
#[async_trait]
pub trait ReleaseIndex: Send + Sync {
    /// Newest release on `query.channel` newer than `query.current_version`
    /// with an artifact for the query's platform, or `None`.
    async fn latest_release(
        &self,
        query: &UpgradeQuery,
    ) -> Result<Option<UpgradeCandidate>, RemoteError>;

    /// Stream `locator` into `dest`, returning the byte count.
    async fn download(
        &self,
        locator: &str,
        dest: &Path,
        progress: &dyn Progress,
    ) -> Result<u64, RemoteError>;
}

/// Write side used by the publishing commands.
#[async_trait]
pub trait ReleasePublisher: Send + Sync {
    /// Draft a release. Returns the created record.
    async fn create_release(&self, release: &ReleaseDescriptor) -> Result<Record, RemoteError>;

    /// Publish a drafted release.
    async fn publish_release(&self, release: &ReleaseRef) -> Result<Record, RemoteError>;

    /// Yank a published release.
    async fn yank_release(&self, release: &ReleaseRef) -> Result<Record, RemoteError>;

    /// Set (`Some`) or clear (`None`) a release's tag.
    async fn tag_release(
        &self,
        release: &ReleaseRef,
        tag: Option<&str>,
    ) -> Result<Record, RemoteError>;

    /// Register an artifact against `release_id`.
    async fn create_artifact(
        &self,
        artifact: &ArtifactDescriptor,
        release_id: &str,
    ) -> Result<UploadTarget, RemoteError>;

    /// Upload exactly `filesize` bytes of `file` (from offset 0) to `target`.
    async fn upload_artifact(
        &self,
        target: &UploadTarget,
        file: std::fs::File,
        filesize: u64,
        progress: Arc<dyn Progress>,
    ) -> Result<(), RemoteError>;
}
