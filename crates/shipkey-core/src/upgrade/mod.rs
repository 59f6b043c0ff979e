//! Signed self-upgrade.
//!
//! [`UpgradeCoordinator`] ties together the rate limit marker
//! ([`UpgradeLock`]), the release index, a [`Confirm`] prompt, signature
//! verification against the upgrade key and [`StagedBinary`] replacement.

mod coordinator;
mod install;
mod lock;
mod prompt;

pub use coordinator::{
    CheckMode, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_TIMEOUT, UpgradeCheckResult, UpgradeConfig,
    UpgradeCoordinator, UpgradeOutcome,
};
pub use install::{StagedBinary, install_from_reader};
pub use lock::{DEFAULT_CHECK_INTERVAL, Gate, UpgradeLock, default_lock_path};
pub use prompt::{AutoAnswer, Confirm, TerminalPrompt, accepts};
