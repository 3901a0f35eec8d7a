//! Account lifecycle
//!
//! An [`Account`] runs an unbounded retry loop around connect → login →
//! sync. Each attempt works on a fresh [`RemoteSyncer`]; the loop only stops
//! on success, a permanent error or cancellation of the account's token.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mailsync_imap::{Connector, ImapConnector};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AccountConfig, ConfigError};
use crate::retry::{retry, Backoff, ConstantBackoff};
use crate::store::{self, LocalStore};
use crate::syncer::RemoteSyncer;
use crate::{Error, SyncResult};

const ACCOUNT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Where an account is in its current sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Idle,
    Connecting,
    Authenticating,
    Syncing,
    /// Waiting out the interval after a failed attempt
    RetryWait,
    Succeeded,
    Failed,
}

/// Progress of the latest sync. Starting and finishing a run are single
/// transitions of this value, so no caller sees a run that is neither
/// running nor finished.
#[derive(Debug, Clone)]
enum RunSlot {
    Never,
    Running,
    Done(SyncResult<()>),
}

/// One configured mailbox identity
pub struct Account<C: Connector = ImapConnector> {
    name: String,
    config: AccountConfig,
    connector: Arc<C>,
    store: Arc<dyn LocalStore>,
    token: CancellationToken,
    state: watch::Sender<AccountState>,
    slot: watch::Sender<RunSlot>,
    attempts: AtomicU32,
}

impl<C: Connector> Account<C> {
    /// Validate `config` and build an idle account. `token` is usually a
    /// child of the manager's token.
    pub fn new(
        name: impl Into<String>,
        config: AccountConfig,
        connector: Arc<C>,
        token: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        config.validate(&name)?;
        let store = store::open(&config.local);

        Ok(Self {
            name,
            config,
            connector,
            store,
            token,
            state: watch::Sender::new(AccountState::Idle),
            slot: watch::Sender::new(RunSlot::Never),
            attempts: AtomicU32::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    pub fn state(&self) -> AccountState {
        *self.state.borrow()
    }

    /// Whether a sync is in progress
    pub fn is_running(&self) -> bool {
        matches!(*self.slot.borrow(), RunSlot::Running)
    }

    /// Attempts made by the current or last sync
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Start the retry loop in the background.
    ///
    /// Fails with an internal error when a sync is already running.
    pub fn sync(self: &Arc<Self>) -> SyncResult<()> {
        let mut started = false;
        self.slot.send_if_modified(|slot| {
            if matches!(slot, RunSlot::Running) {
                return false;
            }
            *slot = RunSlot::Running;
            started = true;
            true
        });
        if !started {
            return Err(Error::internal(format!("account {} is already syncing", self.name)));
        }
        self.attempts.store(0, Ordering::SeqCst);

        let account = Arc::clone(self);
        tokio::spawn(async move {
            let result = account.run().await;
            account.set_state(if result.is_ok() {
                AccountState::Succeeded
            } else {
                AccountState::Failed
            });
            account.slot.send_replace(RunSlot::Done(result));
        });

        Ok(())
    }

    /// Cancel the account's token. Running operations stop at their next
    /// wait point and the sync reports context closed.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Result of the latest sync, waiting for it if it is still running.
    ///
    /// May be called any number of times. Blocks until a sync is started
    /// when none has been.
    pub async fn wait(&self) -> SyncResult<()> {
        let mut rx = self.slot.subscribe();
        let slot = match rx.wait_for(|slot| matches!(slot, RunSlot::Done(_))).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => RunSlot::Never,
        };
        match slot {
            RunSlot::Done(result) => result,
            _ => Err(Error::internal("sync result channel closed")),
        }
    }

    async fn run(&self) -> SyncResult<()> {
        let policy = ConstantBackoff::new(ACCOUNT_RETRY_INTERVAL);
        let interval = policy.interval();

        let result = retry(&policy, &self.token, |attempt| async move {
            self.attempts.store(attempt, Ordering::SeqCst);
            match self.do_sync().await {
                Ok(()) => Ok(()),
                Err(err) if err.is_permanent() => Err(Backoff::Permanent(err)),
                Err(err) => {
                    warn!(
                        account = %self.name,
                        attempt,
                        error = %err,
                        "Sync failed, retrying in {}s",
                        interval.as_secs()
                    );
                    self.set_state(AccountState::RetryWait);
                    Err(Backoff::Transient(err))
                }
            }
        })
        .await;

        match result {
            Ok(()) => {
                info!(account = %self.name, "Sync complete");
                Ok(())
            }
            Err(err) if err.is_canceled() => {
                info!(account = %self.name, "Sync canceled");
                Err(err.into_error())
            }
            Err(err) => {
                let err = err.into_error();
                error!(account = %self.name, error = %err, "Sync stopped");
                Err(err)
            }
        }
    }

    async fn do_sync(&self) -> SyncResult<()> {
        let mut syncer = RemoteSyncer::new(
            self.name.clone(),
            self.config.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.store),
        );

        self.set_state(AccountState::Connecting);
        syncer.connect_with_tls(&self.token).await?;

        self.set_state(AccountState::Authenticating);
        syncer.login(&self.token).await?;

        self.set_state(AccountState::Syncing);
        let result = syncer.sync(&self.token).await;
        syncer.logout(&self.token).await;
        result
    }

    fn set_state(&self, state: AccountState) {
        self.state.send_replace(state);
    }
}
