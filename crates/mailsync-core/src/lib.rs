//! Account synchronization engine for mailsync
//!
//! Runs any number of accounts concurrently. Each account drives a retrying
//! connect → login → sync loop against its server; every network call runs
//! on its own task and is raced against the account's cancellation token.

mod account;
pub mod config;
mod error;
mod manager;
pub mod retry;
pub mod store;
mod syncer;
pub mod task;

#[cfg(test)]
mod testing;

pub use account::{Account, AccountState};
pub use config::{AccountConfig, ConfigError, GeneralConfig, LocalTarget, RemoteConfig, Settings};
pub use error::{classify, Error, ErrorKind, SyncResult};
pub use manager::AccountManager;
pub use store::{LocalStore, NullStore};
pub use syncer::RemoteSyncer;
