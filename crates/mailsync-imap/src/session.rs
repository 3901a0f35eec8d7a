//! Contract between the account engine and a protocol client

use crate::{ConnectOptions, ImapResult, Mailbox, MessageHeader};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A live connection to one server.
///
/// Every method may block on the network; callers that need cancellation
/// run them on a separate task.
#[async_trait]
pub trait MailSession: Send + 'static {
    /// Authenticate. Succeeds without a round trip when already logged in.
    async fn login(&mut self, username: &str, password: &str) -> ImapResult<()>;

    /// LIST "" "*"
    async fn list_mailboxes(&mut self) -> ImapResult<Vec<Mailbox>>;

    /// SELECT, returning the mailbox with its status filled in
    async fn select(&mut self, mailbox: &str) -> ImapResult<Mailbox>;

    /// SEARCH with a raw criterion, returning sorted sequence numbers
    async fn search(&mut self, criterion: &str) -> ImapResult<Vec<u32>>;

    /// FETCH envelopes for `sequence_set`, pushing each item into `sink` as
    /// it arrives. A dropped receiver stops delivery but not the command.
    async fn fetch_envelopes(
        &mut self,
        sequence_set: &str,
        sink: mpsc::Sender<MessageHeader>,
    ) -> ImapResult<()>;

    /// LOGOUT and close the connection
    async fn logout(&mut self) -> ImapResult<()>;
}

/// Opens sessions
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: MailSession;

    /// Dial `host:port` over TLS
    async fn connect(&self, host: &str, port: u16, options: &ConnectOptions)
        -> ImapResult<Self::Session>;
}
