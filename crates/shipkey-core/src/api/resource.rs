//! Addressable remote resources.
//!
//! Commands that fetch or delete "a release or an artifact" pick the
//! concrete reference explicitly and go through [`Resource`].

use std::fmt;

use async_trait::async_trait;

use super::{HttpReleaseApi, Record, RemoteError};

/// Kinds of resource the CLI manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A release
    Release,
    /// An artifact attached to a release
    Artifact,
}

impl ResourceKind {
    /// JSON:API type / collection name.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Release => "releases",
            Self::Artifact => "artifacts",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Release => "release",
            Self::Artifact => "artifact",
        })
    }
}

/// Capability shared by every addressable resource.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Kind and identifier (an ID, or a version/filename the API resolves).
    fn identify(&self) -> (ResourceKind, &str);

    /// Query parameters scoping lookups of this resource.
    fn scope(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Fetch the current record.
    async fn get(&self, api: &HttpReleaseApi) -> Result<Record, RemoteError> {
        let (kind, id) = self.identify();
        api.get_record(kind, id, &self.scope()).await
    }

    /// Delete the resource.
    async fn delete(&self, api: &HttpReleaseApi) -> Result<(), RemoteError> {
        let (kind, id) = self.identify();
        api.delete_record(kind, id, &self.scope()).await
    }
}

/// A release addressed by ID or version, optionally within a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRef {
    /// Release ID or version
    pub id: String,
    /// Package ID or key, when releases are packaged
    pub package: Option<String>,
}

impl ReleaseRef {
    /// Reference a release by ID or version.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            package: None,
        }
    }

    /// Scope the lookup to a package.
    pub fn in_package(mut self, package: Option<String>) -> Self {
        self.package = package.filter(|p| !p.is_empty());
        self
    }
}

#[async_trait]
impl Resource for ReleaseRef {
    fn identify(&self) -> (ResourceKind, &str) {
        (ResourceKind::Release, &self.id)
    }

    fn scope(&self) -> Vec<(&'static str, String)> {
        self.package
            .iter()
            .map(|p| ("package", p.clone()))
            .collect()
    }
}

/// An artifact addressed by ID or filename within a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Artifact ID or filename
    pub id: String,
    /// Owning release ID or version
    pub release: Option<String>,
}

impl ArtifactRef {
    /// Reference an artifact, optionally scoped to a release.
    pub fn new(id: impl Into<String>, release: Option<String>) -> Self {
        Self {
            id: id.into(),
            release,
        }
    }
}

#[async_trait]
impl Resource for ArtifactRef {
    fn identify(&self) -> (ResourceKind, &str) {
        (ResourceKind::Artifact, &self.id)
    }

    fn scope(&self) -> Vec<(&'static str, String)> {
        self.release
            .iter()
            .map(|r| ("release", r.clone()))
            .collect()
    }
}
