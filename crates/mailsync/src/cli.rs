//! Command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mailsync", version, about = "Synchronize mail from several IMAP accounts")]
pub struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, env = "MAILSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sync every activated account once (default)
    Sync,
    /// Sync every activated account periodically until interrupted
    Daemon {
        /// Seconds between rounds, overrides general.interval
        #[arg(short, long)]
        interval: Option<u64>,
    },
}
