//! shipkey - sign, publish and self-upgrade release artifacts
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Command line front end over [`shipkey_core`]. Every command except
//! `upgrade` starts with a throttled background upgrade check.

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use shipkey_core::api::ClientConfig;
use shipkey_core::keygen::{DEFAULT_SIGNING_KEY_FILE, DEFAULT_VERIFY_KEY_FILE};

/// Version this binary reports and upgrades from.
pub const VERSION: &str = env!("SHIPKEY_VERSION");

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("shipkey/", env!("SHIPKEY_VERSION"));

/// Root of trust for self-upgrades (hex). Distinct from any publishing key.
pub const UPGRADE_VERIFY_KEY: &str =
    "27e03094ad276ab7115c5001853e8ff06aadd1ac54b3c8ab4e8ed3962586c696";

/// Account that publishes shipkey itself.
pub const UPGRADE_ACCOUNT_ID: &str = "211cfd40-1ecd-41b2-abc5-66b18b19b6fd";

/// Product that publishes shipkey itself. Also the upgrade signing context.
pub const UPGRADE_PRODUCT_ID: &str = "9265bf9c-25f3-49cb-8575-c7387b55e9d5";

#[derive(Debug, Parser)]
#[command(name = "shipkey")]
#[command(author, version = VERSION, about = "Sign, publish and verify release artifacts")]
pub struct Cli {
    #[command(flatten)]
    pub globals: Globals,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Whether the background upgrade check should run before the command.
    pub fn auto_upgrade_enabled(&self) -> bool {
        !self.globals.no_auto_upgrade && !matches!(self.command, Commands::Upgrade { .. })
    }
}

/// Connection settings shared by every command.
#[derive(Debug, Args)]
pub struct Globals {
    /// Account ID
    #[arg(long, global = true, env = "SHIPKEY_ACCOUNT_ID")]
    pub account: Option<String>,

    /// Product ID
    #[arg(long, global = true, env = "SHIPKEY_PRODUCT_ID")]
    pub product: Option<String>,

    /// API token
    #[arg(long, global = true, env = "SHIPKEY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Environment ID
    #[arg(long, global = true, env = "SHIPKEY_ENVIRONMENT")]
    pub environment: Option<String>,

    /// API host
    #[arg(long, global = true, env = "SHIPKEY_HOST")]
    pub host: Option<String>,

    /// Skip the background upgrade check
    #[arg(
        long,
        global = true,
        env = "SHIPKEY_NO_AUTO_UPGRADE",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_auto_upgrade: bool,
}

impl Globals {
    /// Client settings for the configured account and product.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let Some(account) = self.account.as_deref().filter(|a| !a.is_empty()) else {
            bail!("--account (or SHIPKEY_ACCOUNT_ID) is required");
        };
        let Some(product) = self.product.as_deref().filter(|p| !p.is_empty()) else {
            bail!("--product (or SHIPKEY_PRODUCT_ID) is required");
        };
        let mut config = ClientConfig::new(account, product)
            .with_token(self.token.clone())
            .with_environment(self.environment.clone())
            .with_host(self.host.clone());
        config.user_agent = USER_AGENT.to_string();
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a signing key pair
    Genkey {
        /// Signing key output path (keep secret)
        #[arg(long, default_value = DEFAULT_SIGNING_KEY_FILE)]
        out: PathBuf,
        /// Verify key output path (safe to share)
        #[arg(long, default_value = DEFAULT_VERIFY_KEY_FILE)]
        pubout: PathBuf,
    },
    /// Checksum, sign and upload an artifact to a release
    Upload(UploadArgs),
    /// Draft a new release
    New(NewArgs),
    /// Publish a drafted release
    Publish(ReleaseArgs),
    /// Yank a published release
    Yank(ReleaseArgs),
    /// Tag a release
    Tag {
        #[command(flatten)]
        release: ReleaseArgs,
        /// Tag to set
        #[arg(long)]
        tag: String,
    },
    /// Remove a release's tag
    Untag(ReleaseArgs),
    /// Delete a release, or one of its artifacts
    Del {
        #[command(flatten)]
        release: ReleaseArgs,
        /// Artifact ID or filename to delete instead of the release
        #[arg(long)]
        artifact: Option<String>,
    },
    /// Verify a file's detached signature
    Verify(VerifyArgs),
    /// Upgrade shipkey to the newest signed release
    Upgrade {
        /// Channel to upgrade from (default: from the running version)
        #[arg(long)]
        channel: Option<String>,
    },
}

/// Selects a release.
#[derive(Debug, Args)]
pub struct ReleaseArgs {
    /// Release ID or version
    #[arg(long)]
    pub release: String,
    /// Package ID or key
    #[arg(long)]
    pub package: Option<String>,
}

/// Algorithm and encoding selectors for signing.
#[derive(Debug, Args)]
pub struct SignatureArgs {
    /// ed25519ph or ed25519
    #[arg(long, default_value = "ed25519ph")]
    pub signing_algorithm: String,
    /// base64, base64raw, base64url or hex
    #[arg(long, default_value = "base64raw")]
    pub signature_encoding: String,
    /// Ed25519ph context (default: the product ID)
    #[arg(long)]
    pub signing_context: Option<String>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// File to upload
    pub path: PathBuf,
    #[command(flatten)]
    pub release: ReleaseArgs,
    /// Artifact filename (default: the file's name)
    #[arg(long)]
    pub filename: Option<String>,
    /// Artifact filetype (default: the file's extension)
    #[arg(long)]
    pub filetype: Option<String>,
    /// Target platform, e.g. linux
    #[arg(long)]
    pub platform: Option<String>,
    /// Target architecture, e.g. amd64
    #[arg(long)]
    pub arch: Option<String>,
    /// Pre-calculated checksum, used as given
    #[arg(long)]
    pub checksum: Option<String>,
    /// sha-512, sha-256 or sha-1
    #[arg(long, default_value = "sha-512")]
    pub checksum_algorithm: String,
    /// base64, base64raw, base64url or hex
    #[arg(long, default_value = "base64raw")]
    pub checksum_encoding: String,
    /// Pre-calculated signature, used as given
    #[arg(long)]
    pub signature: Option<String>,
    #[command(flatten)]
    pub signing: SignatureArgs,
    /// Path to the signing key
    #[arg(long, env = "SHIPKEY_SIGNING_KEY_PATH")]
    pub signing_key: Option<PathBuf>,
    /// Signing key as hex, when no path is given
    #[arg(long, env = "SHIPKEY_SIGNING_KEY", hide_env_values = true)]
    pub signing_key_hex: Option<String>,
    /// Artifact metadata as a JSON object
    #[arg(long)]
    pub metadata: Option<String>,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    /// Semantic version, e.g. 1.0.0
    #[arg(long)]
    pub version: String,
    /// stable, rc, beta, alpha or dev
    #[arg(long, default_value = "stable")]
    pub channel: String,
    /// Release tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Human readable name
    #[arg(long)]
    pub name: Option<String>,
    /// Description
    #[arg(long)]
    pub description: Option<String>,
    /// Package ID or key
    #[arg(long)]
    pub package: Option<String>,
    /// Entitlement codes or IDs required to access the release
    #[arg(long, value_delimiter = ',')]
    pub constraints: Vec<String>,
    /// Release metadata as a JSON object
    #[arg(long)]
    pub metadata: Option<String>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// File to verify
    pub path: PathBuf,
    /// Encoded signature
    #[arg(long)]
    pub signature: String,
    /// Path to the verify key
    #[arg(long)]
    pub verify_key: PathBuf,
    /// ed25519ph or ed25519
    #[arg(long, default_value = "ed25519ph")]
    pub signing_algorithm: String,
    /// base64, base64raw, base64url or hex
    #[arg(long, default_value = "base64raw")]
    pub signature_encoding: String,
    /// Ed25519ph context (default: the product ID, if set)
    #[arg(long)]
    pub signing_context: Option<String>,
    /// Also check this encoded checksum
    #[arg(long)]
    pub checksum: Option<String>,
    /// sha-512, sha-256 or sha-1
    #[arg(long, default_value = "sha-512")]
    pub checksum_algorithm: String,
    /// base64, base64raw, base64url or hex
    #[arg(long, default_value = "base64raw")]
    pub checksum_encoding: String,
}

/// One-line report for a failed command, or `None` when the error is not a
/// failure (a declined upgrade).
pub fn describe_error(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<shipkey_core::Error>() {
        Some(e) if !e.is_failure() => None,
        Some(e) => Some(format!("{}: {e}", e.stage())),
        None => Some(format!("{err:#}")),
    }
}
