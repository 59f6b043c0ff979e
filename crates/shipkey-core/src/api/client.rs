//! reqwest implementation of the release API traits.

use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde_json::Value;
use shipkey_schema::{ArtifactDescriptor, ReleaseDescriptor};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::document::{artifact_body, parse_many, parse_single, release_body, tag_body};
use super::{
    Record, ReleaseIndex, ReleasePublisher, ReleaseRef, RemoteError, Resource, ResourceKind,
    UpgradeCandidate, UpgradeQuery, UploadTarget,
};
use crate::checksum::CHUNK_SIZE;
use crate::progress::{Progress, ProgressStage};

/// API host used when none is configured.
pub const DEFAULT_HOST: &str = "https://api.keygen.sh";

const JSONAPI: &str = "application/vnd.api+json";

/// Connection settings, passed explicitly to every client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Account identifier
    pub account: String,
    /// Product identifier
    pub product: String,
    /// Bearer token
    pub token: Option<String>,
    /// Environment identifier, sent as a header
    pub environment: Option<String>,
    /// API host, scheme included
    pub host: String,
    /// User agent header
    pub user_agent: String,
}

impl ClientConfig {
    /// Settings for `account`/`product` against [`DEFAULT_HOST`].
    pub fn new(account: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            product: product.into(),
            token: None,
            environment: None,
            host: DEFAULT_HOST.to_string(),
            user_agent: crate::USER_AGENT.to_string(),
        }
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set the environment.
    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment.filter(|e| !e.is_empty());
        self
    }

    /// Override the host. `None` keeps the current one.
    pub fn with_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.host = host;
        }
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("account", &self.account)
            .field("product", &self.product)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("environment", &self.environment)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// JSON:API client for releases and artifacts.
///
/// API calls never follow redirects (artifact creation answers with a
/// redirect to the upload URL). Uploads and downloads use a second client
/// that does.
#[derive(Debug, Clone)]
pub struct HttpReleaseApi {
    config: ClientConfig,
    api: Client,
    transfer: Client,
}

impl HttpReleaseApi {
    /// Build both HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] if the TLS backend cannot be initialised.
    pub fn new(config: ClientConfig) -> Result<Self, RemoteError> {
        let api = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(RemoteError::transport)?;
        let transfer = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(RemoteError::transport)?;
        Ok(Self {
            config,
            api,
            transfer,
        })
    }

    /// Connection settings in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.config.host).map_err(|e| {
            RemoteError::protocol(format!("invalid host '{}': {e}", self.config.host))
        })?;
        url.path_segments_mut()
            .map_err(|()| RemoteError::protocol("host cannot carry a path"))?
            .pop_if_empty()
            .extend(["v1", "accounts", self.config.account.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, RemoteError> {
        let mut req = self
            .api
            .request(method, self.url(segments)?)
            .header(header::ACCEPT, JSONAPI);
        if let Some(token) = &self.config.token {
            req = req.bearer_auth(token);
        }
        if let Some(environment) = &self.config.environment {
            req = req.header("Keygen-Environment", environment);
        }
        Ok(req)
    }

    fn with_body(req: RequestBuilder, body: &Value) -> RequestBuilder {
        req.header(header::CONTENT_TYPE, JSONAPI)
            .body(body.to_string())
    }

    async fn send(req: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = req.send().await.map_err(RemoteError::transport)?;
        let status = resp.status();
        if status.is_success() || status.is_redirection() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::from_body(
            status.as_u16(),
            status.canonical_reason(),
            &body,
        ))
    }

    async fn send_record(req: RequestBuilder) -> Result<Record, RemoteError> {
        let body = Self::send(req)
            .await?
            .text()
            .await
            .map_err(RemoteError::transport)?;
        parse_single(&body)?.ok_or_else(|| RemoteError::protocol("response contained no resource"))
    }

    fn scoped_query(
        &self,
        kind: ResourceKind,
        scope: &[(&'static str, String)],
    ) -> Vec<(&'static str, String)> {
        let mut query = scope.to_vec();
        if kind == ResourceKind::Release {
            query.push(("product", self.config.product.clone()));
        }
        query
    }

    /// Fetch a record by kind and identifier.
    ///
    /// # Errors
    ///
    /// Returns the API's error, e.g. a 404 for an unknown identifier.
    pub async fn get_record(
        &self,
        kind: ResourceKind,
        id: &str,
        scope: &[(&'static str, String)],
    ) -> Result<Record, RemoteError> {
        let req = self
            .request(Method::GET, &[kind.collection(), id])?
            .query(&self.scoped_query(kind, scope));
        Self::send_record(req).await
    }

    /// Delete a record by kind and identifier.
    ///
    /// # Errors
    ///
    /// Returns the API's error.
    pub async fn delete_record(
        &self,
        kind: ResourceKind,
        id: &str,
        scope: &[(&'static str, String)],
    ) -> Result<(), RemoteError> {
        let req = self
            .request(Method::DELETE, &[kind.collection(), id])?
            .query(&self.scoped_query(kind, scope));
        Self::send(req).await.map(|_| ())
    }

    /// Map entitlement codes to IDs. UUIDs pass through untouched.
    async fn resolve_entitlements(
        &self,
        identifiers: &[String],
    ) -> Result<Vec<String>, RemoteError> {
        let mut ids = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            if looks_like_uuid(identifier) {
                ids.push(identifier.clone());
                continue;
            }
            let req = self.request(Method::GET, &["entitlements", identifier.as_str()])?;
            let record = Self::send_record(req).await?;
            debug!(code = %identifier, id = %record.id, "resolved entitlement");
            ids.push(record.id);
        }
        Ok(ids)
    }

    async fn resolve_package(&self, package: Option<&str>) -> Result<Option<String>, RemoteError> {
        let Some(package) = package else {
            return Ok(None);
        };
        if looks_like_uuid(package) {
            return Ok(Some(package.to_string()));
        }
        let record = Self::send_record(self.request(Method::GET, &["packages", package])?).await?;
        Ok(Some(record.id))
    }

    async fn release_action(
        &self,
        release: &ReleaseRef,
        action: &str,
    ) -> Result<Record, RemoteError> {
        let current = release.get(self).await?;
        let req = self.request(
            Method::POST,
            &["releases", current.id.as_str(), "actions", action],
        )?;
        Self::send_record(req).await
    }
}

#[async_trait]
impl ReleaseIndex for HttpReleaseApi {
    async fn latest_release(
        &self,
        query: &UpgradeQuery,
    ) -> Result<Option<UpgradeCandidate>, RemoteError> {
        let req = self
            .request(Method::GET, &["releases", query.current_version.as_str(), "upgrade"])?
            .query(&[
                ("product", self.config.product.as_str()),
                ("channel", query.channel.as_str()),
            ]);
        let resp = match Self::send(req).await {
            Ok(resp) => resp,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = resp.text().await.map_err(RemoteError::transport)?;
        let Some(release) = parse_single(&body)? else {
            return Ok(None);
        };

        let version = release
            .attr_str("version")
            .ok_or_else(|| RemoteError::protocol("release has no version"))?;
        let version = shipkey_schema::parse_version(version)
            .map_err(|e| RemoteError::protocol(e.to_string()))?;
        let channel = release
            .attr_str("channel")
            .and_then(|c| c.parse().ok())
            .unwrap_or(query.channel);

        let req = self
            .request(Method::GET, &["releases", release.id.as_str(), "artifacts"])?
            .query(&[
                ("platform", query.platform.as_str()),
                ("arch", query.arch.as_str()),
            ]);
        let body = Self::send(req)
            .await?
            .text()
            .await
            .map_err(RemoteError::transport)?;
        let matches = |record: &Record, attr: &str, wanted: &str| {
            record.attr_str(attr).is_none_or(|v| v == wanted)
        };
        let Some(artifact) = parse_many(&body)?.into_iter().find(|a| {
            matches(a, "platform", query.platform.as_str())
                && matches(a, "arch", query.arch.as_str())
        }) else {
            debug!(
                %version,
                platform = %query.platform,
                arch = %query.arch,
                "release has no matching artifact"
            );
            return Ok(None);
        };

        Ok(Some(UpgradeCandidate {
            release_id: release.id,
            version,
            channel,
            filename: artifact
                .attr_str("filename")
                .unwrap_or(&artifact.id)
                .to_string(),
            download_url: self.url(&["artifacts", artifact.id.as_str()])?.to_string(),
            signature: artifact.attr_str("signature").map(str::to_string),
        }))
    }

    async fn download(
        &self,
        locator: &str,
        dest: &Path,
        progress: &dyn Progress,
    ) -> Result<u64, RemoteError> {
        let mut req = self
            .transfer
            .get(locator)
            .header(header::ACCEPT, "application/octet-stream");
        if let Some(token) = &self.config.token {
            req = req.bearer_auth(token);
        }
        let resp = Self::send(req).await?;
        let total = resp.content_length();

        let write_err =
            |e: std::io::Error| RemoteError::transport(format!("writing {}: {e}", dest.display()));
        let mut file = tokio::fs::File::create(dest).await.map_err(write_err)?;
        let mut stream = resp.bytes_stream();
        let mut done = 0u64;
        progress.on_progress(ProgressStage::Download, 0, total);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(RemoteError::transport)?;
            file.write_all(&chunk).await.map_err(write_err)?;
            done += chunk.len() as u64;
            progress.on_progress(ProgressStage::Download, done, total);
        }
        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        Ok(done)
    }
}

#[async_trait]
impl ReleasePublisher for HttpReleaseApi {
    async fn create_release(&self, release: &ReleaseDescriptor) -> Result<Record, RemoteError> {
        let package = self.resolve_package(release.package.as_deref()).await?;
        let entitlements = self.resolve_entitlements(&release.constraints).await?;
        let body = release_body(
            release,
            &self.config.product,
            package.as_deref(),
            &entitlements,
        );
        let req = Self::with_body(self.request(Method::POST, &["releases"])?, &body);
        Self::send_record(req).await
    }

    async fn publish_release(&self, release: &ReleaseRef) -> Result<Record, RemoteError> {
        self.release_action(release, "publish").await
    }

    async fn yank_release(&self, release: &ReleaseRef) -> Result<Record, RemoteError> {
        self.release_action(release, "yank").await
    }

    async fn tag_release(
        &self,
        release: &ReleaseRef,
        tag: Option<&str>,
    ) -> Result<Record, RemoteError> {
        let current = release.get(self).await?;
        let body = tag_body(&current.id, tag);
        let req = Self::with_body(
            self.request(Method::PATCH, &["releases", current.id.as_str()])?,
            &body,
        );
        Self::send_record(req).await
    }

    async fn create_artifact(
        &self,
        artifact: &ArtifactDescriptor,
        release_id: &str,
    ) -> Result<UploadTarget, RemoteError> {
        let body = artifact_body(artifact, release_id);
        let req = Self::with_body(self.request(Method::POST, &["artifacts"])?, &body);
        let resp = Self::send(req).await?;

        let url = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::protocol("artifact created without an upload location"))?;
        let body = resp.text().await.unwrap_or_default();
        let artifact_id = parse_single(&body).ok().flatten().map(|r| r.id);

        Ok(UploadTarget {
            artifact_id,
            url,
            content_type: content_type_for(artifact.filetype.as_deref()).to_string(),
        })
    }

    async fn upload_artifact(
        &self,
        target: &UploadTarget,
        mut file: std::fs::File,
        filesize: u64,
        progress: Arc<dyn Progress>,
    ) -> Result<(), RemoteError> {
        file.rewind()
            .map_err(|e| RemoteError::transport(format!("rewinding upload: {e}")))?;

        let mut sent = 0u64;
        progress.on_progress(ProgressStage::Upload, 0, Some(filesize));
        let stream = ReaderStream::with_capacity(tokio::fs::File::from_std(file), CHUNK_SIZE)
            .inspect(move |chunk| {
                if let Ok(chunk) = chunk {
                    sent += chunk.len() as u64;
                    progress.on_progress(ProgressStage::Upload, sent, Some(filesize));
                }
            });

        // Fixed length: the storage backend rejects chunked transfer.
        let req = self
            .transfer
            .put(&target.url)
            .header(header::CONTENT_TYPE, &target.content_type)
            .header(header::CONTENT_LENGTH, filesize)
            .body(reqwest::Body::wrap_stream(stream));
        Self::send(req).await.map(|_| ())
    }
}

/// Content type for an artifact's filetype.
pub(crate) fn content_type_for(filetype: Option<&str>) -> &'static str {
    match filetype.map(str::to_ascii_lowercase).as_deref() {
        Some("gz" | "tgz") => "application/gzip",
        Some("zip") => "application/zip",
        Some("tar") => "application/x-tar",
        Some("xz") => "application/x-xz",
        Some("bz2") => "application/x-bzip2",
        Some("json") => "application/json",
        Some("txt" | "sig" | "pub") => "text/plain; charset=utf-8",
        Some("dmg") => "application/x-apple-diskimage",
        Some("deb") => "application/vnd.debian.binary-package",
        Some("rpm") => "application/x-rpm",
        Some("msi") => "application/x-msi",
        _ => "application/octet-stream",
    }
}

fn looks_like_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, n)| g.len() == n && g.chars().all(|c| c.is_ascii_hexdigit()))
}
