//! shipkey - sign, publish and self-upgrade release artifacts

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shipkey_cli::ui::Output;
use shipkey_cli::{Cli, Commands, cmd, describe_error};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new();

    if cli.auto_upgrade_enabled() {
        cmd::upgrade::auto_upgrade(&output).await;
    }

    let globals = &cli.globals;
    let result = match &cli.command {
        Commands::Genkey { out, pubout } => cmd::genkey::genkey(out, pubout, &output),
        Commands::Upload(args) => cmd::upload::upload(args, globals, &output).await,
        Commands::New(args) => cmd::release::new(args, globals, &output).await,
        Commands::Publish(args) => cmd::release::publish(args, globals, &output).await,
        Commands::Yank(args) => cmd::release::yank(args, globals, &output).await,
        Commands::Tag { release, tag } => {
            cmd::release::tag(release, Some(tag.as_str()), globals, &output).await
        }
        Commands::Untag(args) => cmd::release::tag(args, None, globals, &output).await,
        Commands::Del { release, artifact } => {
            cmd::release::del(release, artifact.as_deref(), globals, &output).await
        }
        Commands::Verify(args) => cmd::verify::verify(args, globals, &output),
        Commands::Upgrade { channel } => cmd::upgrade::upgrade(channel.as_deref(), &output).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match describe_error(&err) {
            Some(message) => {
                output.error(&message);
                ExitCode::FAILURE
            }
            None => {
                output.info(&err.to_string());
                ExitCode::SUCCESS
            }
        },
    }
}
