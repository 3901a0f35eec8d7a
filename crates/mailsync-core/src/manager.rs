//! Account manager
//!
//! The account set is built once in [`AccountManager::from_settings`] and
//! never changes afterwards; every method takes `&self`.

use std::collections::BTreeMap;
use std::sync::Arc;

use mailsync_imap::{Connector, ImapConnector};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::account::Account;
use crate::config::{ConfigError, Settings};
use crate::SyncResult;

/// Runs every activated account
pub struct AccountManager<C: Connector = ImapConnector> {
    accounts: BTreeMap<String, Arc<Account<C>>>,
    token: CancellationToken,
}

impl<C: Connector> AccountManager<C> {
    /// Build an account for each name in `general.accounts`.
    ///
    /// Fails on the first account that cannot be built.
    pub fn from_settings(settings: &Settings, connector: C) -> Result<Self, ConfigError> {
        let connector = Arc::new(connector);
        let token = CancellationToken::new();
        let mut accounts = BTreeMap::new();

        for name in &settings.general.accounts {
            let folded = name.to_lowercase();
            if accounts.keys().any(|known: &String| known.to_lowercase() == folded) {
                return Err(ConfigError::Duplicate(name.clone()));
            }
            let config = settings.account(name)?.clone();
            let account = Account::new(name.clone(), config, Arc::clone(&connector), token.child_token())?;
            accounts.insert(name.clone(), Arc::new(account));
        }

        info!(count = accounts.len(), "Accounts initialized");
        Ok(Self { accounts, token })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Account<C>>> {
        self.accounts.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    /// Start every account's sync without waiting for any of them
    pub fn sync_all(&self) {
        for account in self.accounts.values() {
            if let Err(err) = account.sync() {
                warn!(account = %account.name(), error = %err, "Sync not started");
            }
        }
    }

    /// Cancel every account. Does not wait; follow with [`Self::wait_all`].
    pub fn shutdown(&self) {
        info!("Shutting down accounts");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`Self::shutdown`] has been called
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Wait for every account's result
    pub async fn wait_all(&self) -> BTreeMap<String, SyncResult<()>> {
        let mut results = BTreeMap::new();
        for (name, account) in &self.accounts {
            results.insert(name.clone(), account.wait().await);
        }
        results
    }
}
