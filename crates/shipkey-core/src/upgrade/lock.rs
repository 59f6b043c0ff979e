//! Marker file throttling implicit upgrade checks.
//!
//! Only the marker's modification time matters. Two processes racing past
//! the gate cost one extra query, so there is no real locking.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

/// Minimum time between implicit checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// `<temp dir>/<app>-auto-upgrade.lock`
pub fn default_lock_path(app: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{app}-auto-upgrade.lock"))
}

/// Result of consulting the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Go ahead and query
    Proceed,
    /// A check ran recently
    Throttled,
}

/// The marker file and its interval.
#[derive(Debug, Clone)]
pub struct UpgradeLock {
    path: PathBuf,
    interval: Duration,
}

impl UpgradeLock {
    /// Marker at `path` allowing one check per `interval`.
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    /// Marker location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consult and update the marker. Filesystem errors never block a check.
    pub fn check(&self) -> Gate {
        self.check_at(SystemTime::now())
    }

    pub(crate) fn check_at(&self, now: SystemTime) -> Gate {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    debug!(path = %self.path.display(), "cannot stat upgrade marker: {e}");
                }
                self.create();
                return Gate::Proceed;
            }
        };

        match now.duration_since(modified) {
            Ok(age) if age >= self.interval => {
                self.touch(now);
                Gate::Proceed
            }
            Ok(age) => {
                debug!(age_secs = age.as_secs(), "upgrade check throttled");
                Gate::Throttled
            }
            // Marker from the future, e.g. after a clock change.
            Err(_) => {
                debug!("upgrade marker is newer than the clock, throttling");
                Gate::Throttled
            }
        }
    }

    fn create(&self) {
        if let Err(e) = File::create(&self.path) {
            debug!(path = %self.path.display(), "cannot create upgrade marker: {e}");
        }
    }

    fn touch(&self, now: SystemTime) {
        let touched = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|f| f.set_modified(now));
        if let Err(e) = touched {
            debug!(path = %self.path.display(), "cannot refresh upgrade marker: {e}");
        }
    }
}
