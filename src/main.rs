use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use ai_log_analyzer::{
    app::{ConfigurationStore, NotifyWatcher, OsFileSystem, StoreOptions},
    cli::{already_reported, handle_command, Cli},
    constants::APP_DIR_NAME,
    crypto::{MachineCipher, OsMachineIdentity},
    utils::init_logger,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        // Turn failures are printed while streaming
        Err(e) if already_reported(&e) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config_dir = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => default_config_dir()?,
    };
    let options = match &cli.environment {
        Some(environment) => StoreOptions::new(config_dir, environment.as_str()),
        None => StoreOptions::from_env(config_dir),
    };

    let store = ConfigurationStore::new(
        Arc::new(OsFileSystem),
        Arc::new(NotifyWatcher),
        Arc::new(MachineCipher::new(Arc::new(OsMachineIdentity))),
        options,
    );

    handle_command(&cli.command, Arc::new(store)).await
}

fn default_config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_DIR_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine a configuration directory, pass --config-dir")
}
