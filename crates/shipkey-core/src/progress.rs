//! Progress observer for dependency injection
//!
//! Long-running stages report byte counts through [`Progress`] so the core
//! never depends on a particular terminal renderer. Observers have no say in
//! control flow; [`NullProgress`] is used where nothing is displayed.

use std::fmt;

/// Stage a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    /// Hashing for a checksum
    Checksum,
    /// Hashing or reading for a signature
    Signing,
    /// Uploading an artifact
    Upload,
    /// Downloading an upgrade
    Download,
    /// Verifying a downloaded upgrade
    Verify,
    /// Replacing the executable
    Install,
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Checksum => "checksum",
            Self::Signing => "signing",
            Self::Upload => "uploading",
            Self::Download => "downloading",
            Self::Verify => "verifying",
            Self::Install => "installing",
        })
    }
}

/// Receives `(stage, bytes done, bytes total)` updates.
pub trait Progress: Send + Sync {
    /// Called as a stage advances. `total` is `None` when unknown.
    fn on_progress(&self, stage: ProgressStage, done: u64, total: Option<u64>);
}

/// Observer that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn on_progress(&self, _stage: ProgressStage, _done: u64, _total: Option<u64>) {}
}

impl<T: Progress + ?Sized> Progress for std::sync::Arc<T> {
    fn on_progress(&self, stage: ProgressStage, done: u64, total: Option<u64>) {
        (**self).on_progress(stage, done, total);
    }
}

impl<T: Progress + ?Sized> Progress for &T {
    fn on_progress(&self, stage: ProgressStage, done: u64, total: Option<u64>) {
        (**self).on_progress(stage, done, total);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every update for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingProgress {
        pub(crate) events: Mutex<Vec<(ProgressStage, u64, Option<u64>)>>,
    }

    impl Progress for RecordingProgress {
        fn on_progress(&self, stage: ProgressStage, done: u64, total: Option<u64>) {
            self.events.lock().unwrap().push((stage, done, total));
        }
    }

    impl RecordingProgress {
        pub(crate) fn stages(&self) -> Vec<ProgressStage> {
            let mut stages: Vec<_> = self.events.lock().unwrap().iter().map(|e| e.0).collect();
            stages.dedup();
            stages
        }
    }
}
