//! mailsync - synchronize mail from several IMAP accounts
//!
//! Runs every account activated in the configuration concurrently, once or
//! as a daemon.

mod cli;
mod settings;
mod shutdown;

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use mailsync_core::{AccountManager, ErrorKind, SyncResult};
use mailsync_imap::ImapConnector;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "mailsync=info,mailsync_core=info,mailsync_imap=info";

const MIN_DAEMON_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = settings::load(cli.config.as_deref())?;
    let manager = AccountManager::from_settings(&settings, ImapConnector)
        .context("invalid account configuration")?;

    if manager.is_empty() {
        warn!("No accounts activated, check general.accounts");
        return Ok(());
    }

    let manager = Arc::new(manager);
    shutdown::spawn(Arc::clone(&manager));

    match cli.command.unwrap_or(Command::Sync) {
        Command::Sync => sync_round(&manager).await,
        Command::Daemon { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| settings.general.interval())
                .max(MIN_DAEMON_INTERVAL);
            daemon(&manager, interval).await;
        }
    }

    info!("Bye");
    Ok(())
}

async fn daemon(manager: &AccountManager, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Running as daemon");

    loop {
        sync_round(manager).await;

        tokio::select! {
            _ = manager.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn sync_round(manager: &AccountManager) {
    info!(accounts = manager.len(), "Starting sync");
    manager.sync_all();
    report(&manager.wait_all().await);
}

fn report(results: &BTreeMap<String, SyncResult<()>>) {
    for (name, result) in results {
        match result {
            Ok(()) => info!(account = %name, "Synced"),
            Err(err) if err.kind() == ErrorKind::ContextClosed => {
                info!(account = %name, "Interrupted")
            }
            Err(err) => error!(account = %name, error = %err, "Sync failed"),
        }
    }
}
