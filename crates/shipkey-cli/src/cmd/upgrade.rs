//! `shipkey upgrade` and the background check run before other commands.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use shipkey_core::api::{ClientConfig, HttpReleaseApi};
use shipkey_core::upgrade::{
    CheckMode, TerminalPrompt, UpgradeConfig, UpgradeCoordinator, UpgradeOutcome,
};
use shipkey_core::{Error, VerifyKey};
use shipkey_schema::Channel;
use tracing::debug;

use super::selector;
use crate::ui::{Output, TerminalProgress};
use crate::{UPGRADE_ACCOUNT_ID, UPGRADE_PRODUCT_ID, UPGRADE_VERIFY_KEY, USER_AGENT, VERSION};

type Coordinator = UpgradeCoordinator<HttpReleaseApi, TerminalPrompt>;

/// Upgrade settings for this binary: embedded key, product context and
/// the resolved path of the running executable.
pub fn upgrade_config(channel: Option<Channel>) -> Result<UpgradeConfig, Error> {
    let key = VerifyKey::from_hex(UPGRADE_VERIFY_KEY)?;
    Ok(UpgradeConfig::new(VERSION, key, current_exe()?)
        .with_channel(channel)
        .with_context(UPGRADE_PRODUCT_ID))
}

fn current_exe() -> Result<PathBuf, Error> {
    let exe = std::env::current_exe().map_err(|e| Error::install("locating executable", e))?;
    Ok(std::fs::canonicalize(&exe).unwrap_or(exe))
}

fn coordinator(channel: Option<Channel>) -> Result<Coordinator, Error> {
    let mut config = ClientConfig::new(UPGRADE_ACCOUNT_ID, UPGRADE_PRODUCT_ID);
    config.user_agent = USER_AGENT.to_string();
    let index = HttpReleaseApi::new(config)?;
    Ok(
        UpgradeCoordinator::new(index, TerminalPrompt, upgrade_config(channel)?)
            .with_progress(Arc::new(TerminalProgress::new())),
    )
}

/// Explicit upgrade. Failures are returned to the caller.
pub async fn upgrade(channel: Option<&str>, output: &Output) -> Result<()> {
    let channel = channel.map(selector::<Channel>).transpose()?;
    let coordinator = coordinator(channel)?;
    output.info(&format!(
        "checking the {} channel for a newer shipkey (running v{VERSION})",
        coordinator.config().channel().as_str()
    ));

    match coordinator.run(CheckMode::Explicit).await? {
        UpgradeOutcome::UpToDate => output.success(&format!("shipkey is up to date (v{VERSION})")),
        UpgradeOutcome::Installed { version } => {
            output.success(&format!("upgraded shipkey to v{version}"));
        }
    }
    Ok(())
}

/// Background check before another command. Never fails the command.
pub async fn auto_upgrade(output: &Output) {
    if !std::io::stderr().is_terminal() {
        debug!("stderr is not a terminal, skipping background upgrade check");
        return;
    }
    let coordinator = match coordinator(None) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            debug!("background upgrade check unavailable: {e}");
            return;
        }
    };

    match coordinator.run(CheckMode::Implicit).await {
        Ok(UpgradeOutcome::UpToDate) => {}
        Ok(UpgradeOutcome::Installed { version }) => {
            output.success(&format!(
                "upgraded shipkey to v{version}, it takes effect from the next run"
            ));
        }
        Err(e) if !e.is_failure() => output.info(&e.to_string()),
        Err(e) => output.warning(&format!("upgrade failed: {}: {e}", e.stage())),
    }
}
