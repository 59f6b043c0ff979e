//! The self-upgrade state machine.
//!
//! `gate -> channel -> query -> prompt -> fetch + verify -> install`. The
//! query runs under [`UpgradeConfig::timeout`], the binary download under
//! [`UpgradeConfig::download_timeout`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use shipkey_schema::{Channel, Encoding, SigningAlgorithm, current_arch, current_platform};
use tracing::{debug, info};

use super::install::StagedBinary;
use super::lock::{DEFAULT_CHECK_INTERVAL, Gate, UpgradeLock, default_lock_path};
use super::prompt::Confirm;
use crate::api::{ReleaseIndex, RemoteError, UpgradeCandidate, UpgradeQuery};
use crate::progress::{NullProgress, Progress};
use crate::signature::{self, SignatureParams};
use crate::{Error, Result, VerifyKey};

/// Default deadline for the release query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for downloading the new binary.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Who asked for the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Background check before another command. Rate limited, errors logged.
    Implicit,
    /// The user ran `upgrade`. Never throttled, errors surfaced.
    Explicit,
}

/// Everything the coordinator needs, passed at construction.
#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    /// Version of the running binary
    pub current_version: String,
    /// Channel override; derived from `current_version` when `None`
    pub channel: Option<Channel>,
    /// Key upgrades must be signed with
    pub verify_key: VerifyKey,
    /// Signature mode of upgrade artifacts
    pub algorithm: SigningAlgorithm,
    /// Signature encoding of upgrade artifacts
    pub encoding: Encoding,
    /// Ed25519ph context of upgrade artifacts
    pub context: Option<String>,
    /// Executable to replace
    pub target: PathBuf,
    /// Rate limit marker
    pub lock_path: PathBuf,
    /// Minimum time between implicit checks
    pub check_interval: Duration,
    /// Deadline for the release query
    pub timeout: Duration,
    /// Deadline for the binary download
    pub download_timeout: Duration,
    /// Platform to fetch, e.g. `linux`
    pub platform: String,
    /// Architecture to fetch, e.g. `amd64`
    pub arch: String,
}

impl UpgradeConfig {
    /// Defaults for this host: ed25519ph, base64raw, 24h interval, 30s query
    /// and 10min download deadlines.
    pub fn new(current_version: impl Into<String>, verify_key: VerifyKey, target: PathBuf) -> Self {
        Self {
            current_version: current_version.into(),
            channel: None,
            verify_key,
            algorithm: SigningAlgorithm::Ed25519ph,
            encoding: Encoding::Base64Raw,
            context: None,
            target,
            lock_path: default_lock_path("shipkey"),
            check_interval: DEFAULT_CHECK_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            platform: current_platform().to_string(),
            arch: current_arch().to_string(),
        }
    }

    /// Override the channel.
    pub fn with_channel(mut self, channel: Option<Channel>) -> Self {
        self.channel = channel;
        self
    }

    /// Bind a signing context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Move the rate limit marker.
    pub fn with_lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = path.into();
        self
    }

    /// Change the query deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Change the download deadline.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Channel to query: the override, or the one implied by the version.
    pub fn channel(&self) -> Channel {
        self.channel
            .unwrap_or_else(|| Channel::from_version(&self.current_version))
    }
}

/// Outcome of the query half of the flow.
#[derive(Debug)]
pub enum UpgradeCheckResult {
    /// Nothing newer, or the check was throttled
    NoUpgradeAvailable,
    /// A newer release exists
    UpgradeAvailable(UpgradeCandidate),
    /// The query failed
    CheckFailed(Error),
}

/// Outcome of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// Nothing was installed
    UpToDate,
    /// The target now holds `version`
    Installed {
        /// Installed version
        version: semver::Version,
    },
}

/// Drives one upgrade attempt against a [`ReleaseIndex`].
pub struct UpgradeCoordinator<I, C> {
    index: I,
    confirm: C,
    config: UpgradeConfig,
    progress: Arc<dyn Progress>,
}

impl<I, C> std::fmt::Debug for UpgradeCoordinator<I, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<I: ReleaseIndex, C: Confirm> UpgradeCoordinator<I, C> {
    /// Create a coordinator.
    pub fn new(index: I, confirm: C, config: UpgradeConfig) -> Self {
        Self {
            index,
            confirm,
            config,
            progress: Arc::new(NullProgress),
        }
    }

    /// Report download and verification progress.
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// Run the gate and the remote query.
    pub async fn check(&self, mode: CheckMode) -> UpgradeCheckResult {
        if mode == CheckMode::Implicit {
            let lock = UpgradeLock::new(&self.config.lock_path, self.config.check_interval);
            if lock.check() == Gate::Throttled {
                return UpgradeCheckResult::NoUpgradeAvailable;
            }
        }

        let query = UpgradeQuery {
            current_version: self.config.current_version.clone(),
            channel: self.config.channel(),
            platform: self.config.platform.clone(),
            arch: self.config.arch.clone(),
        };
        debug!(
            version = %query.current_version,
            channel = %query.channel.as_str(),
            "checking for upgrade"
        );

        let found = tokio::time::timeout(self.config.timeout, self.index.latest_release(&query))
            .await
            .unwrap_or_else(|_| Err(RemoteError::timeout("upgrade check", self.config.timeout)));

        match found {
            Ok(Some(candidate)) if self.is_newer(&candidate.version) => {
                UpgradeCheckResult::UpgradeAvailable(candidate)
            }
            Ok(Some(candidate)) => {
                debug!(version = %candidate.version, "offered release is not newer");
                UpgradeCheckResult::NoUpgradeAvailable
            }
            Ok(None) => UpgradeCheckResult::NoUpgradeAvailable,
            Err(e) => UpgradeCheckResult::CheckFailed(e.into()),
        }
    }

    /// Full flow: check, confirm, fetch, verify, install.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] when an explicit check fails (implicit failures
    ///   are logged and reported as [`UpgradeOutcome::UpToDate`])
    /// - [`Error::UserDeclined`] when the prompt is refused
    /// - [`Error::VerificationFailed`] or [`Error::Install`] from
    ///   [`install`](Self::install)
    pub async fn run(&self, mode: CheckMode) -> Result<UpgradeOutcome> {
        let candidate = match self.check(mode).await {
            UpgradeCheckResult::NoUpgradeAvailable => return Ok(UpgradeOutcome::UpToDate),
            UpgradeCheckResult::UpgradeAvailable(candidate) => candidate,
            UpgradeCheckResult::CheckFailed(e) if mode == CheckMode::Implicit => {
                debug!("background upgrade check failed: {e}");
                return Ok(UpgradeOutcome::UpToDate);
            }
            UpgradeCheckResult::CheckFailed(e) => return Err(e),
        };

        let question = format!(
            "A new version is available ({} -> {}). Install it?",
            self.config.current_version, candidate.version
        );
        if !self.confirm.confirm(&question) {
            return Err(Error::UserDeclined);
        }

        self.install(&candidate).await?;
        Ok(UpgradeOutcome::Installed {
            version: candidate.version,
        })
    }

    /// Download `candidate`, verify it against the upgrade key and replace
    /// the target. Nothing is installed unless the signature is valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VerificationFailed`] for a missing or invalid
    /// signature and [`Error::Install`] if downloading or replacing fails.
    pub async fn install(&self, candidate: &UpgradeCandidate) -> Result<()> {
        let signature = candidate.signature.as_deref().ok_or_else(|| {
            Error::VerificationFailed(format!("{} is not signed", candidate.filename))
        })?;

        let mut staged = StagedBinary::for_target(&self.config.target)?;
        let download = self.index.download(
            &candidate.download_url,
            staged.path(),
            self.progress.as_ref(),
        );
        let deadline = self.config.download_timeout;
        let bytes = tokio::time::timeout(deadline, download)
            .await
            .unwrap_or_else(|_| Err(RemoteError::timeout("download", deadline)))
            .map_err(|e| Error::install("downloading upgrade", e))?;
        debug!(bytes, file = %candidate.filename, "downloaded upgrade");

        let params = SignatureParams {
            algorithm: self.config.algorithm,
            context: self.config.context.as_deref(),
            encoding: self.config.encoding,
        };
        let valid = signature::verify_with_progress(
            staged.file_mut(),
            &self.config.verify_key,
            signature,
            params,
            self.progress.as_ref(),
        )?;
        if !valid {
            return Err(Error::VerificationFailed(format!(
                "{} is not signed by the upgrade key",
                candidate.filename
            )));
        }

        staged.commit(&self.config.target)?;
        info!(version = %candidate.version, "upgrade installed");
        Ok(())
    }

    fn is_newer(&self, offered: &semver::Version) -> bool {
        match shipkey_schema::parse_version(&self.config.current_version) {
            Ok(current) => *offered > current,
            Err(e) => {
                debug!("running version is not semver ({e}), trusting the index");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen;
    use crate::signature::sign;
    use crate::upgrade::AutoAnswer;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;
    use tempfile::{TempDir, tempdir};

    const CONTEXT: &str = "upgrade-product";
    const PAYLOAD: &[u8] = b"#!/bin/sh\necho new\n";

    #[derive(Default)]
    struct FakeIndex {
        candidate: Option<UpgradeCandidate>,
        error: Option<RemoteError>,
        payload: Vec<u8>,
        download_delay: Duration,
        queries: AtomicUsize,
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl ReleaseIndex for FakeIndex {
        async fn latest_release(
            &self,
            _query: &UpgradeQuery,
        ) -> std::result::Result<Option<UpgradeCandidate>, RemoteError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(self.candidate.clone()),
            }
        }

        async fn download(
            &self,
            _locator: &str,
            dest: &Path,
            _progress: &dyn Progress,
        ) -> std::result::Result<u64, RemoteError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if !self.download_delay.is_zero() {
                tokio::time::sleep(self.download_delay).await;
            }
            std::fs::write(dest, &self.payload).map_err(RemoteError::transport)?;
            Ok(self.payload.len() as u64)
        }
    }

    struct Fixture {
        dir: TempDir,
        pair: keygen::Keypair,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            std::fs::write(dir.path().join("tool"), b"old").unwrap();
            Self {
                dir,
                pair: keygen::generate(),
            }
        }

        fn target(&self) -> PathBuf {
            self.dir.path().join("tool")
        }

        fn lock(&self) -> PathBuf {
            self.dir.path().join("tool.lock")
        }

        fn config(&self, version: &str) -> UpgradeConfig {
            UpgradeConfig::new(version, self.pair.verify, self.target())
                .with_context(CONTEXT)
                .with_lock_path(self.lock())
        }

        fn signed_candidate(&self, version: &str, payload: &[u8]) -> UpgradeCandidate {
            let signature = sign(
                &mut Cursor::new(payload.to_vec()),
                &self.pair.signing,
                SignatureParams::prehashed(Some(CONTEXT)),
            )
            .unwrap();
            candidate(version, Some(signature))
        }
    }

    fn candidate(version: &str, signature: Option<String>) -> UpgradeCandidate {
        UpgradeCandidate {
            release_id: "rel".into(),
            version: semver::Version::parse(version).unwrap(),
            channel: Channel::Stable,
            filename: "tool_linux_amd64".into(),
            download_url: "https://example.invalid/artifacts/a".into(),
            signature,
        }
    }

    fn index(candidate: UpgradeCandidate, payload: &[u8]) -> FakeIndex {
        FakeIndex {
            candidate: Some(candidate),
            payload: payload.to_vec(),
            ..FakeIndex::default()
        }
    }

    #[test]
    fn test_channel_resolution() {
        let key = keygen::generate().verify;
        let config = |v: &str| UpgradeConfig::new(v, key, PathBuf::from("x"));
        assert_eq!(config("1.2.3-beta.1").channel(), Channel::Beta);
        assert_eq!(config("1.2.3").channel(), Channel::Stable);
        assert_eq!(config("1.2.3-rc.2").channel(), Channel::Rc);
        assert_eq!(
            config("1.2.3-rc.2").with_channel(Some(Channel::Dev)).channel(),
            Channel::Dev
        );
    }

    #[tokio::test]
    async fn test_fresh_marker_skips_query() {
        let fx = Fixture::new();
        std::fs::File::create(fx.lock()).unwrap();
        let index = index(fx.signed_candidate("2.0.0", PAYLOAD), PAYLOAD);

        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(true), fx.config("1.0.0"));
        let result = coordinator.check(CheckMode::Implicit).await;

        assert!(matches!(result, UpgradeCheckResult::NoUpgradeAvailable));
        assert_eq!(coordinator.index.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_marker_queries_and_refreshes() {
        let fx = Fixture::new();
        let marker = std::fs::File::create(fx.lock()).unwrap();
        let day_ago = SystemTime::now() - Duration::from_secs(25 * 3600);
        marker.set_modified(day_ago).unwrap();
        drop(marker);

        let coordinator =
            UpgradeCoordinator::new(FakeIndex::default(), AutoAnswer(true), fx.config("1.0.0"));
        let result = coordinator.check(CheckMode::Implicit).await;

        assert!(matches!(result, UpgradeCheckResult::NoUpgradeAvailable));
        assert_eq!(coordinator.index.queries.load(Ordering::SeqCst), 1);
        let modified = std::fs::metadata(fx.lock()).unwrap().modified().unwrap();
        assert!(modified > day_ago + Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_explicit_check_ignores_marker() {
        let fx = Fixture::new();
        std::fs::File::create(fx.lock()).unwrap();
        let index = index(fx.signed_candidate("2.0.0", PAYLOAD), PAYLOAD);

        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(true), fx.config("1.0.0"));
        let result = coordinator.check(CheckMode::Explicit).await;
        assert!(matches!(result, UpgradeCheckResult::UpgradeAvailable(_)));
    }

    #[tokio::test]
    async fn test_remote_errors_swallowed_only_when_implicit() {
        let fx = Fixture::new();
        let failing = || FakeIndex {
            error: Some(RemoteError::from_body(500, Some("Internal Server Error"), "")),
            ..FakeIndex::default()
        };

        let implicit = UpgradeCoordinator::new(failing(), AutoAnswer(true), fx.config("1.0.0"));
        assert_eq!(
            implicit.run(CheckMode::Implicit).await.unwrap(),
            UpgradeOutcome::UpToDate
        );

        let explicit = UpgradeCoordinator::new(failing(), AutoAnswer(true), fx.config("1.0.0"));
        let err = explicit.run(CheckMode::Explicit).await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref r) if r.status == Some(500)));
        assert_eq!(err.stage(), crate::Stage::RemoteQuery);
    }

    #[tokio::test]
    async fn test_older_release_is_not_an_upgrade() {
        let fx = Fixture::new();
        let index = index(fx.signed_candidate("1.0.0", PAYLOAD), PAYLOAD);
        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(true), fx.config("1.0.0"));
        assert!(matches!(
            coordinator.check(CheckMode::Explicit).await,
            UpgradeCheckResult::NoUpgradeAvailable
        ));
    }

    #[tokio::test]
    async fn test_verified_upgrade_is_installed() {
        let fx = Fixture::new();
        let index = index(fx.signed_candidate("1.1.0", PAYLOAD), PAYLOAD);
        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(true), fx.config("1.0.0"));

        let outcome = coordinator.run(CheckMode::Explicit).await.unwrap();
        assert_eq!(
            outcome,
            UpgradeOutcome::Installed {
                version: semver::Version::new(1, 1, 0)
            }
        );
        assert_eq!(std::fs::read(fx.target()).unwrap(), PAYLOAD);
    }

    #[tokio::test]
    async fn test_tampered_download_is_not_installed() {
        let fx = Fixture::new();
        let index = index(fx.signed_candidate("1.1.0", PAYLOAD), b"#!/bin/sh\necho tampered\n");
        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(true), fx.config("1.0.0"));

        let err = coordinator.run(CheckMode::Explicit).await.unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
        assert_eq!(std::fs::read(fx.target()).unwrap(), b"old");
        let leftovers = std::fs::read_dir(fx.dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_wrong_context_is_not_installed() {
        let fx = Fixture::new();
        let index = index(fx.signed_candidate("1.1.0", PAYLOAD), PAYLOAD);
        let config = fx.config("1.0.0").with_context("other-product");
        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(true), config);

        let err = coordinator.run(CheckMode::Explicit).await.unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
        assert_eq!(std::fs::read(fx.target()).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_unsigned_release_is_rejected_before_download() {
        let fx = Fixture::new();
        let index = index(candidate("1.1.0", None), PAYLOAD);
        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(true), fx.config("1.0.0"));

        let err = coordinator.run(CheckMode::Explicit).await.unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
        assert_eq!(coordinator.index.downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_declined_upgrade() {
        let fx = Fixture::new();
        let index = index(fx.signed_candidate("1.1.0", PAYLOAD), PAYLOAD);
        let coordinator = UpgradeCoordinator::new(index, AutoAnswer(false), fx.config("1.0.0"));

        let err = coordinator.run(CheckMode::Explicit).await.unwrap_err();
        assert!(matches!(err, Error::UserDeclined));
        assert!(!err.is_failure());
        assert_eq!(coordinator.index.downloads.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(fx.target()).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_slow_index_times_out() {
        struct SlowIndex;

        #[async_trait]
        impl ReleaseIndex for SlowIndex {
            async fn latest_release(
                &self,
                _query: &UpgradeQuery,
            ) -> std::result::Result<Option<UpgradeCandidate>, RemoteError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(None)
            }

            async fn download(
                &self,
                _locator: &str,
                _dest: &Path,
                _progress: &dyn Progress,
            ) -> std::result::Result<u64, RemoteError> {
                Ok(0)
            }
        }

        let fx = Fixture::new();
        let config = fx.config("1.0.0").with_timeout(Duration::from_millis(20));
        let coordinator = UpgradeCoordinator::new(SlowIndex, AutoAnswer(true), config);
        let err = coordinator.run(CheckMode::Explicit).await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref r) if r.code.as_deref() == Some("TIMEOUT")));
    }

    #[tokio::test]
    async fn test_download_has_its_own_deadline() {
        let fx = Fixture::new();
        let mut idx = index(fx.signed_candidate("1.1.0", PAYLOAD), PAYLOAD);
        idx.download_delay = Duration::from_millis(100);
        let config = fx
            .config("1.0.0")
            .with_timeout(Duration::from_millis(20))
            .with_download_timeout(Duration::from_secs(5));
        let coordinator = UpgradeCoordinator::new(idx, AutoAnswer(true), config);

        let outcome = coordinator.run(CheckMode::Explicit).await.unwrap();
        assert!(matches!(outcome, UpgradeOutcome::Installed { .. }));
        assert_eq!(std::fs::read(fx.target()).unwrap(), PAYLOAD);
    }

    #[tokio::test]
    async fn test_slow_download_is_install_error() {
        let fx = Fixture::new();
        let mut idx = index(fx.signed_candidate("1.1.0", PAYLOAD), PAYLOAD);
        idx.download_delay = Duration::from_millis(500);
        let config = fx
            .config("1.0.0")
            .with_download_timeout(Duration::from_millis(20));
        let coordinator = UpgradeCoordinator::new(idx, AutoAnswer(true), config);

        let err = coordinator.run(CheckMode::Explicit).await.unwrap_err();
        assert_eq!(err.stage(), crate::Stage::Install);
        assert_eq!(std::fs::read(fx.target()).unwrap(), b"old");
    }
}
