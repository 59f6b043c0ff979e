//! Release and artifact descriptors.
//!
//! These are the attribute sets sent to the release API when drafting a
//! release or registering an artifact. Validation that must happen before
//! any network call (version parsing, metadata shape) lives here.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Channel, SchemaError};

/// A release to be drafted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Normalized semantic version.
    pub version: semver::Version,
    /// Release channel.
    pub channel: Channel,
    /// Optional free-form tag, e.g. `latest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Longer description or changelog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Entitlement identifiers (IDs or codes) restricting access.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    /// Package identifier the release belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Arbitrary JSON metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ReleaseDescriptor {
    /// Create a descriptor, parsing and normalizing `version`.
    ///
    /// A leading `v` is accepted (`v1.2.0` becomes `1.2.0`).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidVersion`] if `version` is not semver.
    pub fn new(version: &str, channel: Channel) -> Result<Self, SchemaError> {
        Ok(Self {
            version: parse_version(version)?,
            channel,
            tag: None,
            name: None,
            description: None,
            constraints: Vec::new(),
            package: None,
            metadata: None,
        })
    }

    /// Set the tag. Empty strings are treated as absent.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = non_empty(tag.into());
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_empty(description.into());
        self
    }

    /// Attach entitlement constraints.
    pub fn with_constraints<I, S>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints = constraints
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.is_empty())
            .collect();
        self
    }

    /// Scope the release to a package.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = non_empty(package.into());
        self
    }

    /// Attach metadata given as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Metadata`] unless the text is a JSON object.
    pub fn with_metadata_json(mut self, json: &str) -> Result<Self, SchemaError> {
        self.metadata = parse_metadata(json)?;
        Ok(self)
    }
}

/// Parse and normalize a semantic version, tolerating a `v` prefix.
///
/// # Errors
///
/// Returns [`SchemaError::InvalidVersion`] if the text is not semver.
pub fn parse_version(version: &str) -> Result<semver::Version, SchemaError> {
    let trimmed = version.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    semver::Version::parse(bare).map_err(|source| SchemaError::InvalidVersion {
        version: version.to_string(),
        source,
    })
}

/// Parse a metadata argument. Empty input means no metadata.
///
/// # Errors
///
/// Returns [`SchemaError::Metadata`] for invalid JSON or a non-object value.
pub fn parse_metadata(json: &str) -> Result<Option<Map<String, Value>>, SchemaError> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(other) => Err(SchemaError::Metadata(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(SchemaError::Metadata(e.to_string())),
    }
}

/// An artifact to be registered against a release.
///
/// `filesize` is the exact byte length that will be uploaded; it is fixed
/// before the upload starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Remote file name.
    pub filename: String,
    /// Exact upload length in bytes.
    pub filesize: u64,
    /// File type, usually the extension without the dot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filetype: Option<String>,
    /// Target platform, e.g. `linux`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Target architecture, e.g. `amd64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Encoded checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Encoded detached signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Arbitrary JSON metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ArtifactDescriptor {
    /// Descriptor with the filetype derived from the filename.
    pub fn new(filename: impl Into<String>, filesize: u64) -> Self {
        let filename = filename.into();
        let filetype = filetype_for(&filename);
        Self {
            filename,
            filesize,
            filetype,
            platform: None,
            arch: None,
            checksum: None,
            signature: None,
            metadata: None,
        }
    }
}

/// File type implied by a filename's extension.
///
/// Purely numeric extensions come from version numbers in extensionless
/// binaries (`app-1.0.0`) and yield `None`.
///
/// ```
/// use shipkey_schema::filetype_for;
///
/// assert_eq!(filetype_for("app.tar.gz").as_deref(), Some("gz"));
/// assert_eq!(filetype_for("app-1.0.0"), None);
/// ```
pub fn filetype_for(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    if ext.is_empty() || ext.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(ext.to_string())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_normalized() {
        let release = ReleaseDescriptor::new("v1.2.0-beta.1", Channel::Beta).unwrap();
        assert_eq!(release.version.to_string(), "1.2.0-beta.1");
    }

    #[test]
    fn test_invalid_version_rejected() {
        let err = ReleaseDescriptor::new("1.2", Channel::Stable).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidVersion { .. }));
    }

    #[test]
    fn test_builder_drops_empty_values() {
        let release = ReleaseDescriptor::new("1.0.0", Channel::Stable)
            .unwrap()
            .with_tag("")
            .with_name("First")
            .with_constraints(["ent-a", "", "ent-b"]);
        assert_eq!(release.tag, None);
        assert_eq!(release.name.as_deref(), Some("First"));
        assert_eq!(release.constraints, vec!["ent-a", "ent-b"]);
    }

    #[test]
    fn test_metadata_must_be_object() {
        assert!(parse_metadata("").unwrap().is_none());
        assert!(parse_metadata(r#"{"a":1}"#).unwrap().is_some());
        assert!(matches!(
            parse_metadata("[1,2]"),
            Err(SchemaError::Metadata(_))
        ));
        assert!(parse_metadata("{").is_err());
    }

    #[test]
    fn test_filetype() {
        assert_eq!(filetype_for("shipkey.exe").as_deref(), Some("exe"));
        assert_eq!(filetype_for("shipkey_linux_amd64"), None);
        assert_eq!(filetype_for("shipkey-2.0.10"), None);
        assert_eq!(ArtifactDescriptor::new("a.zip", 3).filetype.as_deref(), Some("zip"));
    }

    #[test]
    fn test_artifact_serialization_skips_absent_fields() {
        let artifact = ArtifactDescriptor::new("app", 10);
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json, serde_json::json!({"filename": "app", "filesize": 10}));
    }
}
