//! IMAP session client for mailsync
//!
//! Wraps async-imap with the handful of operations the account engine
//! drives: TLS connect, LOGIN, LIST, SELECT, SEARCH, envelope FETCH and
//! LOGOUT. The engine only talks to the [`Connector`] and [`MailSession`]
//! traits, [`ImapConnector`] is the network implementation.

mod client;
mod error;
mod mailbox;
mod message;
mod session;

pub use client::{ConnectOptions, ImapClient, ImapConnector};
pub use error::{ImapError, ImapResult};
pub use mailbox::Mailbox;
pub use message::{EmailAddress, Envelope, MessageHeader};
pub use session::{Connector, MailSession};
