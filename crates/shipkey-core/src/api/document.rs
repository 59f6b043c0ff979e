//! JSON:API request and response documents.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use shipkey_schema::{ArtifactDescriptor, ReleaseDescriptor};

use super::RemoteError;

/// A resource object returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Record {
    /// Resource identifier
    pub id: String,
    /// Resource type, e.g. `releases`
    #[serde(rename = "type")]
    pub kind: String,
    /// Attribute map
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Record {
    /// A string attribute, if present.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Single {
    pub(crate) data: Option<Record>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Many {
    #[serde(default)]
    pub(crate) data: Vec<Record>,
}

pub(crate) fn parse_single(body: &str) -> Result<Option<Record>, RemoteError> {
    serde_json::from_str::<Single>(body)
        .map(|doc| doc.data)
        .map_err(|e| RemoteError::protocol(format!("invalid resource document: {e}")))
}

pub(crate) fn parse_many(body: &str) -> Result<Vec<Record>, RemoteError> {
    serde_json::from_str::<Many>(body)
        .map(|doc| doc.data)
        .map_err(|e| RemoteError::protocol(format!("invalid collection document: {e}")))
}

fn identifier(kind: &str, id: &str) -> Value {
    json!({ "data": { "type": kind, "id": id } })
}

/// `POST releases` body. `entitlements` are already-resolved entitlement IDs.
pub(crate) fn release_body(
    release: &ReleaseDescriptor,
    product: &str,
    package: Option<&str>,
    entitlements: &[String],
) -> Value {
    let mut attributes = Map::new();
    attributes.insert("version".into(), json!(release.version.to_string()));
    attributes.insert("channel".into(), json!(release.channel.as_str()));
    attributes.insert("tag".into(), json!(release.tag));
    if let Some(name) = &release.name {
        attributes.insert("name".into(), json!(name));
    }
    if let Some(description) = &release.description {
        attributes.insert("description".into(), json!(description));
    }
    if let Some(metadata) = &release.metadata {
        attributes.insert("metadata".into(), Value::Object(metadata.clone()));
    }

    let mut relationships = Map::new();
    relationships.insert("product".into(), identifier("products", product));
    if let Some(package) = package {
        relationships.insert("package".into(), identifier("packages", package));
    }
    if !entitlements.is_empty() {
        let constraints: Vec<Value> = entitlements
            .iter()
            .map(|id| {
                json!({
                    "type": "constraints",
                    "relationships": { "entitlement": identifier("entitlements", id) }
                })
            })
            .collect();
        relationships.insert("constraints".into(), json!({ "data": constraints }));
    }

    json!({
        "data": {
            "type": "releases",
            "attributes": attributes,
            "relationships": relationships,
        }
    })
}

/// `PATCH releases/{id}` body updating only the tag.
pub(crate) fn tag_body(id: &str, tag: Option<&str>) -> Value {
    json!({
        "data": {
            "type": "releases",
            "id": id,
            "attributes": { "tag": tag }
        }
    })
}

/// `POST artifacts` body.
pub(crate) fn artifact_body(artifact: &ArtifactDescriptor, release_id: &str) -> Value {
    json!({
        "data": {
            "type": "artifacts",
            "attributes": artifact,
            "relationships": { "release": identifier("releases", release_id) }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipkey_schema::Channel;

    #[test]
    fn test_release_body_shape() {
        let release = ReleaseDescriptor::new("1.0.0", Channel::Beta)
            .unwrap()
            .with_name("One")
            .with_metadata_json(r#"{"k":"v"}"#)
            .unwrap();
        let body = release_body(&release, "prod", Some("pkg"), &["ent-1".to_string()]);

        let data = &body["data"];
        assert_eq!(data["type"], "releases");
        assert_eq!(data["attributes"]["version"], "1.0.0");
        assert_eq!(data["attributes"]["channel"], "beta");
        assert_eq!(data["attributes"]["tag"], Value::Null);
        assert_eq!(data["attributes"]["metadata"]["k"], "v");
        assert_eq!(data["relationships"]["product"]["data"]["id"], "prod");
        assert_eq!(data["relationships"]["package"]["data"]["type"], "packages");
        assert_eq!(
            data["relationships"]["constraints"]["data"][0]["relationships"]["entitlement"]["data"]
                ["id"],
            "ent-1"
        );
    }

    #[test]
    fn test_artifact_body_shape() {
        let mut artifact = ArtifactDescriptor::new("app.tar.gz", 42);
        artifact.platform = Some("linux".into());
        let body = artifact_body(&artifact, "rel-1");
        assert_eq!(body["data"]["attributes"]["filesize"], 42);
        assert_eq!(body["data"]["attributes"]["filetype"], "gz");
        assert_eq!(body["data"]["attributes"]["platform"], "linux");
        assert!(body["data"]["attributes"].get("signature").is_none());
        assert_eq!(body["data"]["relationships"]["release"]["data"]["id"], "rel-1");
    }

    #[test]
    fn test_parse_documents() {
        let one = parse_single(
            r#"{"data":{"id":"r1","type":"releases","attributes":{"version":"1.0.0"}}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(one.attr_str("version"), Some("1.0.0"));
        assert!(parse_single(r#"{"data":null}"#).unwrap().is_none());
        assert!(parse_many(r#"{"data":[]}"#).unwrap().is_empty());
        assert!(parse_single("nope").is_err());
    }
}
