//! Structured errors from the release API.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// A failure reported by (or while reaching) the release API.
///
/// Mirrors the first entry of a JSON:API `errors` array. Transport failures
/// and timeouts are folded into the same shape so callers have a single
/// type to show.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{title}:{} {detail}{}",
    pointer_part(.field_path.as_deref()),
    code_part(.code.as_deref())
)]
pub struct RemoteError {
    /// Short summary, e.g. "Unprocessable resource"
    pub title: String,
    /// Human readable explanation
    pub detail: String,
    /// Machine readable code, e.g. `VERSION_TAKEN`
    pub code: Option<String>,
    /// JSON pointer to the offending attribute, e.g. `/data/attributes/version`
    pub field_path: Option<String>,
    /// HTTP status, if a response was received
    pub status: Option<u16>,
}

impl RemoteError {
    /// Error for a request that never produced a response.
    pub fn transport(err: impl fmt::Display) -> Self {
        Self {
            title: "Request failed".to_string(),
            detail: err.to_string(),
            code: None,
            field_path: None,
            status: None,
        }
    }

    /// Error for a request that exceeded its deadline.
    pub fn timeout(what: &str, after: std::time::Duration) -> Self {
        Self {
            title: "Request timed out".to_string(),
            detail: format!("{what} did not finish within {}s", after.as_secs()),
            code: Some("TIMEOUT".to_string()),
            field_path: None,
            status: None,
        }
    }

    /// Error for a response the client could not interpret.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self {
            title: "Unexpected response".to_string(),
            detail: detail.into(),
            code: None,
            field_path: None,
            status: None,
        }
    }

    /// Build from a non-success status and its body.
    pub fn from_body(status: u16, reason: Option<&str>, body: &str) -> Self {
        if let Ok(doc) = serde_json::from_str::<ErrorDocument>(body) {
            if let Some(first) = doc.errors.into_iter().next() {
                return Self {
                    title: first
                        .title
                        .unwrap_or_else(|| reason.unwrap_or("Error").to_string()),
                    detail: first.detail.unwrap_or_default(),
                    code: first.code,
                    field_path: first.source.and_then(|s| s.pointer),
                    status: Some(status),
                };
            }
        }

        let mut detail: String = body.trim().chars().take(200).collect();
        if detail.is_empty() {
            detail = format!("HTTP {status}");
        }
        Self {
            title: reason.unwrap_or("Error").to_string(),
            detail,
            code: None,
            field_path: None,
            status: Some(status),
        }
    }

    /// `true` for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

fn pointer_part(pointer: Option<&str>) -> String {
    pointer.map(|p| format!(" {p}")).unwrap_or_default()
}

fn code_part(code: Option<&str>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    title: Option<String>,
    detail: Option<String>,
    code: Option<String>,
    source: Option<ErrorSource>,
}

#[derive(Debug, Deserialize)]
struct ErrorSource {
    pointer: Option<String>,
}
