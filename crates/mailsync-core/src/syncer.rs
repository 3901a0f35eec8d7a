//! Remote session driver
//!
//! A [`RemoteSyncer`] owns at most one live session. Every protocol call is
//! started with [`run_async`] and raced against the account's token, so a
//! shutdown never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use mailsync_imap::{ConnectOptions, Connector, MailSession, Mailbox};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AccountConfig;
use crate::retry::{retry, Backoff, ConstantBackoff, RetryError};
use crate::store::LocalStore;
use crate::task::{run_async, WaitOutcome};
use crate::{Error, SyncResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_TIMEOUT: Duration = Duration::from_secs(60);

const SYNC_RETRY_INTERVAL: Duration = Duration::from_secs(2);
const SYNC_MAX_ATTEMPTS: u32 = 3;

/// Envelopes buffered between the fetch task and the consumer
const FETCH_PIPELINE_DEPTH: usize = 10;

/// Drives one session against one server
pub struct RemoteSyncer<C: Connector> {
    account: String,
    config: AccountConfig,
    connector: Arc<C>,
    store: Arc<dyn LocalStore>,
    session: Option<Arc<Mutex<C::Session>>>,
}

impl<C: Connector> RemoteSyncer<C> {
    pub fn new(
        account: impl Into<String>,
        config: AccountConfig,
        connector: Arc<C>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        Self {
            account: account.into(),
            config,
            connector,
            store,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Dial the server over TLS
    pub async fn connect_with_tls(&mut self, token: &CancellationToken) -> SyncResult<()> {
        let remote = self.config.remote.clone();
        let connector = Arc::clone(&self.connector);
        let options = ConnectOptions {
            connect_timeout: CONNECT_TIMEOUT,
            keep_alive: remote.keep_alive(),
            io_timeout: SOCKET_TIMEOUT,
        };

        info!(account = %self.account, host = %remote.host, port = remote.port, "Connecting");

        let unit = run_async(async move {
            connector
                .connect(&remote.host, remote.port, &options)
                .await
                .map_err(Error::connect)
        });
        let session = unit.wait_context(token).await.into_result()?;

        self.session = Some(Arc::new(Mutex::new(session)));
        info!(account = %self.account, "Connected");
        Ok(())
    }

    /// Authenticate the connected session
    pub async fn login(&self, token: &CancellationToken) -> SyncResult<()> {
        let session = self.session()?;
        let username = self.config.remote.username.clone();
        let password = self.config.remote.password.clone();

        let unit = run_async(async move {
            let mut client = session.lock().await;
            client.login(&username, &password).await.map_err(|err| {
                if err.is_auth_rejection() {
                    Error::login(err)
                } else {
                    Error::foreign(err)
                }
            })
        });
        unit.wait_context(token).await.into_result()?;

        info!(account = %self.account, user = %self.config.remote.username, "Logged in");
        Ok(())
    }

    /// Run sync passes until one succeeds, a permanent error occurs or the
    /// attempts are used up.
    pub async fn sync(&self, token: &CancellationToken) -> SyncResult<()> {
        let policy = ConstantBackoff::new(SYNC_RETRY_INTERVAL).with_max_attempts(SYNC_MAX_ATTEMPTS);

        let result = retry(&policy, token, |attempt| async move {
            match self.sync_pass(token).await {
                Ok(()) => Ok(()),
                Err(err) if err.is_permanent() => Err(Backoff::Permanent(err)),
                Err(err) => {
                    warn!(account = %self.account, attempt, error = %err, "Sync pass failed");
                    Err(Backoff::Transient(err))
                }
            }
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Canceled) => Err(Error::context_closed()),
            Err(RetryError::Stopped(err)) => {
                if !err.is_permanent() {
                    warn!(
                        account = %self.account,
                        attempts = policy.max_attempts().unwrap_or_default(),
                        "Max retry reached"
                    );
                }
                Err(err)
            }
        }
    }

    /// End the session. Failures are logged and otherwise ignored.
    pub async fn logout(&mut self, token: &CancellationToken) {
        let Some(session) = self.session.take() else {
            return;
        };

        if token.is_cancelled() {
            debug!(account = %self.account, "Closing connection without LOGOUT");
            return;
        }

        let unit = run_async(async move {
            let mut client = session.lock().await;
            client.logout().await.map_err(Error::foreign)
        });
        match unit.wait_context(token).await {
            WaitOutcome::Succeeded(()) => debug!(account = %self.account, "Logged out"),
            WaitOutcome::Failed(err) => debug!(account = %self.account, error = %err, "Logout failed"),
            WaitOutcome::Canceled => {}
        }
    }

    async fn sync_pass(&self, token: &CancellationToken) -> SyncResult<()> {
        let mailboxes = self.list_mailboxes(token).await?;
        info!(account = %self.account, count = mailboxes.len(), "Listed mailboxes");

        for mailbox in mailboxes {
            if !mailbox.is_selectable() {
                debug!(account = %self.account, mailbox = %mailbox.name, "Skipping unselectable mailbox");
                continue;
            }
            self.sync_mailbox(&mailbox.name, token).await?;
        }

        Ok(())
    }

    async fn sync_mailbox(&self, mailbox: &str, token: &CancellationToken) -> SyncResult<()> {
        let status = self.select(mailbox, token).await?;
        info!(
            account = %self.account,
            mailbox,
            messages = status.message_count(),
            "Selected mailbox"
        );

        let high_water_mark = self.store.high_water_mark(&self.account, mailbox);
        let criterion = search_criterion(Local::now().date_naive(), self.config.max_age, high_water_mark);
        let matches = self.search(criterion.clone(), token).await?;
        debug!(account = %self.account, mailbox, %criterion, matches = matches.len(), "Searched mailbox");

        if matches.is_empty() {
            return Ok(());
        }
        self.fetch(mailbox, &matches, token).await
    }

    async fn list_mailboxes(&self, token: &CancellationToken) -> SyncResult<Vec<Mailbox>> {
        let session = self.session()?;
        let unit = run_async(async move {
            let mut client = session.lock().await;
            client.list_mailboxes().await.map_err(Error::list_mailbox)
        });
        unit.wait_context(token).await.into_result()
    }

    async fn select(&self, mailbox: &str, token: &CancellationToken) -> SyncResult<Mailbox> {
        let session = self.session()?;
        let name = mailbox.to_string();
        let unit = run_async(async move {
            let mut client = session.lock().await;
            client.select(&name).await.map_err(Error::select)
        });
        unit.wait_context(token).await.into_result()
    }

    async fn search(&self, criterion: String, token: &CancellationToken) -> SyncResult<Vec<u32>> {
        let session = self.session()?;
        let unit = run_async(async move {
            let mut client = session.lock().await;
            client.search(&criterion).await.map_err(Error::list_mail)
        });
        unit.wait_context(token).await.into_result()
    }

    /// Fetch envelopes for `ids`, consuming them as they stream in
    async fn fetch(&self, mailbox: &str, ids: &[u32], token: &CancellationToken) -> SyncResult<()> {
        let session = self.session()?;
        let set = sequence_set(ids);
        let (tx, mut rx) = mpsc::channel(FETCH_PIPELINE_DEPTH);

        let unit = run_async(async move {
            let mut client = session.lock().await;
            client.fetch_envelopes(&set, tx).await.map_err(Error::fetch)
        });

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                header = rx.recv() => match header {
                    Some(header) => {
                        info!(
                            account = %self.account,
                            mailbox,
                            from = %header.sender(),
                            "* {}",
                            header.subject()
                        );
                        self.store.record(&self.account, mailbox, &header);
                    }
                    None => break,
                },
            }
        }

        unit.wait_context(token).await.into_result()
    }

    fn session(&self) -> SyncResult<Arc<Mutex<C::Session>>> {
        self.session
            .clone()
            .ok_or_else(|| Error::internal("no session, connect first"))
    }
}

/// SEARCH criterion covering the window that still needs syncing
fn search_criterion(today: NaiveDate, max_age: u32, high_water_mark: Option<NaiveDate>) -> String {
    let oldest = if max_age > 0 {
        today.checked_sub_days(Days::new(u64::from(max_age)))
    } else {
        None
    };

    // None orders before any date
    match oldest.max(high_water_mark) {
        Some(since) => format!("SINCE {}", since.format("%-d-%b-%Y")),
        None => "ALL".to_string(),
    }
}

/// Compress sorted sequence numbers into an IMAP sequence set
fn sequence_set(ids: &[u32]) -> String {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &id in ids {
        match ranges.last_mut() {
            Some((_, end)) if *end == id => {}
            Some((_, end)) if end.checked_add(1) == Some(id) => *end = id,
            _ => ranges.push((id, id)),
        }
    }

    ranges
        .into_iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{}:{}", start, end)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
