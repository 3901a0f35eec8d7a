//! Scripted connector for engine tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailsync_imap::{
    ConnectOptions, Connector, Envelope, ImapError, ImapResult, MailSession, Mailbox,
    MessageHeader,
};
use tokio::sync::mpsc;

use crate::config::{AccountConfig, LocalTarget, RemoteConfig};

pub fn account_config() -> AccountConfig {
    AccountConfig {
        remote: RemoteConfig {
            host: "imap.example.com".into(),
            port: 993,
            username: "me@example.com".into(),
            password: "secret".into(),
            keep_alive: 0,
            hold_connection: String::new(),
        },
        local: LocalTarget::default(),
        max_age: 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectBehavior {
    Succeed,
    Refuse,
    /// Succeed for this many connects, then never return
    HangAfter(u32),
}

/// How a mailbox command behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Succeed,
    Fail,
    /// Fetch only: deliver the first envelope, then never finish
    Hang,
}

/// Calls observed across every session of one connector
#[derive(Debug, Default)]
pub struct Stats {
    pub connects: AtomicU32,
    pub logins: AtomicU32,
    pub lists: AtomicU32,
    pub logouts: AtomicU32,
    pub selected: Mutex<Vec<String>>,
    pub criteria: Mutex<Vec<String>>,
    pub fetched: Mutex<Vec<String>>,
}

#[derive(Debug)]
struct Script {
    connect: ConnectBehavior,
    login_ok: bool,
    /// LIST fails while this is above zero, counting down across sessions
    failing_lists: AtomicU32,
    mailboxes: Vec<(Mailbox, Vec<u32>)>,
    select: Step,
    search: Step,
    fetch: Step,
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Arc<Script>,
    stats: Arc<Stats>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script {
                connect: ConnectBehavior::Succeed,
                login_ok: true,
                failing_lists: AtomicU32::new(0),
                mailboxes: Vec::new(),
                select: Step::Succeed,
                search: Step::Succeed,
                fetch: Step::Succeed,
            }),
            stats: Arc::default(),
        }
    }

    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    pub fn refuse_connect(self) -> Self {
        self.edit(|s| s.connect = ConnectBehavior::Refuse)
    }

    pub fn hang_connect(self) -> Self {
        self.hang_connect_after(0)
    }

    pub fn hang_connect_after(self, connects: u32) -> Self {
        self.edit(|s| s.connect = ConnectBehavior::HangAfter(connects))
    }

    pub fn fail_select(self) -> Self {
        self.edit(|s| s.select = Step::Fail)
    }

    pub fn fail_search(self) -> Self {
        self.edit(|s| s.search = Step::Fail)
    }

    pub fn fail_fetch(self) -> Self {
        self.edit(|s| s.fetch = Step::Fail)
    }

    pub fn hang_fetch(self) -> Self {
        self.edit(|s| s.fetch = Step::Hang)
    }

    pub fn reject_login(self) -> Self {
        self.edit(|s| s.login_ok = false)
    }

    pub fn fail_passes(self, passes: u32) -> Self {
        self.edit(|s| s.failing_lists = AtomicU32::new(passes))
    }

    pub fn with_mailbox(self, name: &str, ids: Vec<u32>) -> Self {
        let mailbox = Mailbox::new(name, Some('/'), vec!["\\HasNoChildren".into()]);
        self.edit(|s| s.mailboxes.push((mailbox, ids)))
    }

    pub fn with_unselectable(self, name: &str) -> Self {
        let mailbox = Mailbox::new(name, Some('/'), vec!["\\Noselect".into()]);
        self.edit(|s| s.mailboxes.push((mailbox, Vec::new())))
    }

    // Only used while building, before the script is shared
    fn edit(mut self, change: impl FnOnce(&mut Script)) -> Self {
        if let Some(script) = Arc::get_mut(&mut self.script) {
            change(script);
        }
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        _options: &ConnectOptions,
    ) -> ImapResult<MockSession> {
        let previous = self.stats.connects.fetch_add(1, Ordering::SeqCst);
        match self.script.connect {
            ConnectBehavior::Refuse => Err(ImapError::ConnectionFailed("connection refused".into())),
            ConnectBehavior::HangAfter(limit) if previous >= limit => std::future::pending().await,
            _ => Ok(MockSession {
                script: Arc::clone(&self.script),
                stats: Arc::clone(&self.stats),
                selected: None,
            }),
        }
    }
}

pub struct MockSession {
    script: Arc<Script>,
    stats: Arc<Stats>,
    selected: Option<usize>,
}

#[async_trait]
impl MailSession for MockSession {
    async fn login(&mut self, _username: &str, _password: &str) -> ImapResult<()> {
        self.stats.logins.fetch_add(1, Ordering::SeqCst);
        if self.script.login_ok {
            Ok(())
        } else {
            Err(ImapError::AuthenticationFailed("invalid credentials".into()))
        }
    }

    async fn list_mailboxes(&mut self) -> ImapResult<Vec<Mailbox>> {
        self.stats.lists.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .script
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ImapError::ServerError("BYE server shutting down".into()));
        }
        Ok(self.script.mailboxes.iter().map(|(m, _)| m.clone()).collect())
    }

    async fn select(&mut self, mailbox: &str) -> ImapResult<Mailbox> {
        self.stats.selected.lock().unwrap().push(mailbox.to_string());
        if self.script.select == Step::Fail {
            return Err(ImapError::MailboxNotFound(mailbox.to_string()));
        }
        let index = self
            .script
            .mailboxes
            .iter()
            .position(|(m, _)| m.name == mailbox)
            .ok_or_else(|| ImapError::MailboxNotFound(mailbox.to_string()))?;
        self.selected = Some(index);

        let (mailbox, ids) = &self.script.mailboxes[index];
        let mut status = mailbox.clone();
        status.exists = Some(ids.len() as u32);
        Ok(status)
    }

    async fn search(&mut self, criterion: &str) -> ImapResult<Vec<u32>> {
        self.stats.criteria.lock().unwrap().push(criterion.to_string());
        if self.script.search == Step::Fail {
            return Err(ImapError::ServerError("BAD invalid search criteria".into()));
        }
        let index = self.selected.ok_or(ImapError::NotAuthenticated)?;
        Ok(self.script.mailboxes[index].1.clone())
    }

    async fn fetch_envelopes(
        &mut self,
        sequence_set: &str,
        sink: mpsc::Sender<MessageHeader>,
    ) -> ImapResult<()> {
        self.stats.fetched.lock().unwrap().push(sequence_set.to_string());
        if self.script.fetch == Step::Fail {
            return Err(ImapError::ParseError("unexpected FETCH response".into()));
        }
        let index = self.selected.ok_or(ImapError::NotAuthenticated)?;
        for &seq in &self.script.mailboxes[index].1 {
            let header = MessageHeader {
                seq,
                uid: Some(seq + 100),
                envelope: Envelope {
                    subject: Some(format!("Message {}", seq)),
                    ..Envelope::default()
                },
            };
            if sink.send(header).await.is_err() {
                break;
            }
            if self.script.fetch == Step::Hang {
                std::future::pending::<()>().await;
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> ImapResult<()> {
        self.stats.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
