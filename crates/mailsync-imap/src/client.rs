//! IMAP client implementation

use crate::message::{EmailAddress, Envelope};
use crate::{Connector, ImapError, ImapResult, MailSession, Mailbox, MessageHeader};
use async_imap::error::Error as ProtocolError;
use async_imap::{Client, Session};
use async_native_tls::{TlsConnector, TlsStream};
use async_trait::async_trait;
use futures::TryStreamExt;
use imap_proto::types::{Address, NameAttribute};
use socket2::{SockRef, TcpKeepalive};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

// Type alias for our TLS stream
type ImapStream = TlsStream<TcpStream>;

/// Dial and socket parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Upper bound for TCP connect plus TLS handshake
    pub connect_timeout: Duration,
    /// TCP keep-alive idle time; `None` leaves the OS default
    pub keep_alive: Option<Duration>,
    /// Upper bound for any single response from the server
    pub io_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keep_alive: None,
            io_timeout: Duration::from_secs(60),
        }
    }
}

enum State {
    Connected(Client<ImapStream>),
    Authenticated(Session<ImapStream>),
    Closed,
}

/// One TLS connection to an IMAP server
pub struct ImapClient {
    host: String,
    port: u16,
    io_timeout: Duration,
    state: State,
}

impl ImapClient {
    /// Connect over TLS. The greeting is consumed by the first command.
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        options: &ConnectOptions,
    ) -> ImapResult<Self> {
        let host = host.into();
        info!("Connecting to {}:{}", host, port);

        let dial = async {
            let tcp_stream = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| ImapError::ConnectionFailed(e.to_string()))?;

            if let Some(idle) = options.keep_alive {
                if let Err(e) = set_keep_alive(&tcp_stream, idle) {
                    warn!("Could not set TCP keep-alive for {}: {}", host, e);
                }
            }

            let tls_connector = TlsConnector::new();
            tls_connector
                .connect(&host, tcp_stream)
                .await
                .map_err(|e| ImapError::TlsError(e.to_string()))
        };

        let tls_stream = time::timeout(options.connect_timeout, dial)
            .await
            .map_err(|_| ImapError::Timeout)??;

        debug!("TLS connection established");

        Ok(Self {
            host,
            port,
            io_timeout: options.io_timeout,
            state: State::Connected(Client::new(tls_stream)),
        })
    }

    /// Server this client is connected to, as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Authenticate with LOGIN
    pub async fn login(&mut self, username: &str, password: &str) -> ImapResult<()> {
        let client = match std::mem::replace(&mut self.state, State::Closed) {
            State::Connected(client) => client,
            State::Authenticated(session) => {
                debug!("Already logged in as {}", username);
                self.state = State::Authenticated(session);
                return Ok(());
            }
            State::Closed => return Err(ImapError::NotConnected),
        };

        info!("Authenticating with LOGIN for {}", username);

        match time::timeout(self.io_timeout, client.login(username, password)).await {
            Err(_) => Err(ImapError::Timeout),
            Ok(Ok(session)) => {
                self.state = State::Authenticated(session);
                info!("LOGIN authentication successful");
                Ok(())
            }
            Ok(Err((e, client))) => {
                self.state = State::Connected(client);
                warn!("LOGIN rejected for {}: {}", username, e);
                Err(login_error(e))
            }
        }
    }

    fn session_mut(&mut self) -> ImapResult<&mut Session<ImapStream>> {
        match &mut self.state {
            State::Authenticated(session) => Ok(session),
            State::Connected(_) => Err(ImapError::NotAuthenticated),
            State::Closed => Err(ImapError::NotConnected),
        }
    }

    /// List all mailboxes
    pub async fn list_mailboxes(&mut self) -> ImapResult<Vec<Mailbox>> {
        let timeout = self.io_timeout;
        let session = self.session_mut()?;

        let mut stream = bounded(timeout, async move {
            session.list(None, Some("*")).await.map_err(server_error)
        })
        .await?;

        let mut mailboxes = Vec::new();
        while let Some(name) = bounded(timeout, async {
            stream.try_next().await.map_err(server_error)
        })
        .await?
        {
            let delimiter = name.delimiter().and_then(|d| d.chars().next());
            let attributes = name.attributes().iter().map(attribute_name).collect();
            mailboxes.push(Mailbox::new(name.name(), delimiter, attributes));
        }

        debug!("Found {} mailboxes", mailboxes.len());
        Ok(mailboxes)
    }

    /// Select a mailbox and read its status
    pub async fn select(&mut self, name: &str) -> ImapResult<Mailbox> {
        let timeout = self.io_timeout;
        let session = self.session_mut()?;

        let status = bounded(timeout, async move {
            session.select(name).await.map_err(|e| match e {
                ProtocolError::No(msg) | ProtocolError::Bad(msg) => {
                    ImapError::MailboxNotFound(format!("{}: {}", name, msg))
                }
                other => server_error(other),
            })
        })
        .await?;

        let mut mailbox = Mailbox::new(name, None, Vec::new());
        mailbox.exists = Some(status.exists);
        mailbox.uid_validity = status.uid_validity;
        mailbox.uid_next = status.uid_next;

        debug!("Selected {} with {} messages", name, status.exists);
        Ok(mailbox)
    }

    /// SEARCH with a raw criterion such as `SINCE 1-May-2022`
    pub async fn search(&mut self, criterion: &str) -> ImapResult<Vec<u32>> {
        let timeout = self.io_timeout;
        let session = self.session_mut()?;

        let found = bounded(timeout, async move {
            session.search(criterion).await.map_err(server_error)
        })
        .await?;

        let mut ids: Vec<u32> = found.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Stream envelopes for a sequence set into `sink`
    pub async fn fetch_envelopes(
        &mut self,
        sequence_set: &str,
        sink: mpsc::Sender<MessageHeader>,
    ) -> ImapResult<()> {
        let timeout = self.io_timeout;
        let session = self.session_mut()?;

        let mut stream = bounded(timeout, async move {
            session
                .fetch(sequence_set, "(UID ENVELOPE)")
                .await
                .map_err(server_error)
        })
        .await?;

        // Keep draining after the receiver goes away so the session is left
        // at a command boundary.
        let mut delivering = true;
        while let Some(fetch) = bounded(timeout, async {
            stream
                .try_next()
                .await
                .map_err(|e| ImapError::ParseError(e.to_string()))
        })
        .await?
        {
            if !delivering {
                continue;
            }
            let header = MessageHeader {
                seq: fetch.message,
                uid: fetch.uid,
                envelope: fetch.envelope().map(convert_envelope).unwrap_or_default(),
            };
            if sink.send(header).await.is_err() {
                debug!("Envelope receiver dropped, discarding the rest of the fetch");
                delivering = false;
            }
        }

        Ok(())
    }

    /// Close the connection
    pub async fn logout(&mut self) -> ImapResult<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Authenticated(mut session) => {
                bounded(self.io_timeout, async {
                    session.logout().await.map_err(server_error)
                })
                .await?;
                debug!("Logged out of {}", self.address());
                Ok(())
            }
            State::Connected(_) | State::Closed => Ok(()),
        }
    }
}

#[async_trait]
impl MailSession for ImapClient {
    async fn login(&mut self, username: &str, password: &str) -> ImapResult<()> {
        ImapClient::login(self, username, password).await
    }

    async fn list_mailboxes(&mut self) -> ImapResult<Vec<Mailbox>> {
        ImapClient::list_mailboxes(self).await
    }

    async fn select(&mut self, mailbox: &str) -> ImapResult<Mailbox> {
        ImapClient::select(self, mailbox).await
    }

    async fn search(&mut self, criterion: &str) -> ImapResult<Vec<u32>> {
        ImapClient::search(self, criterion).await
    }

    async fn fetch_envelopes(
        &mut self,
        sequence_set: &str,
        sink: mpsc::Sender<MessageHeader>,
    ) -> ImapResult<()> {
        ImapClient::fetch_envelopes(self, sequence_set, sink).await
    }

    async fn logout(&mut self) -> ImapResult<()> {
        ImapClient::logout(self).await
    }
}

/// Opens [`ImapClient`] connections
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapConnector;

#[async_trait]
impl Connector for ImapConnector {
    type Session = ImapClient;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        options: &ConnectOptions,
    ) -> ImapResult<ImapClient> {
        ImapClient::connect(host, port, options).await
    }
}

async fn bounded<T, F>(timeout: Duration, operation: F) -> ImapResult<T>
where
    F: Future<Output = ImapResult<T>>,
{
    time::timeout(timeout, operation)
        .await
        .unwrap_or(Err(ImapError::Timeout))
}

fn set_keep_alive(stream: &TcpStream, idle: Duration) -> std::io::Result<()> {
    SockRef::from(stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))
}

fn server_error(e: ProtocolError) -> ImapError {
    match e {
        ProtocolError::Io(e) => ImapError::IoError(e),
        other => ImapError::ServerError(other.to_string()),
    }
}

fn login_error(e: ProtocolError) -> ImapError {
    match e {
        ProtocolError::No(msg) | ProtocolError::Bad(msg) => ImapError::AuthenticationFailed(msg),
        other => server_error(other),
    }
}

fn attribute_name(attr: &NameAttribute<'_>) -> String {
    match attr {
        NameAttribute::NoSelect => "\\Noselect".to_string(),
        NameAttribute::NoInferiors => "\\Noinferiors".to_string(),
        NameAttribute::Marked => "\\Marked".to_string(),
        NameAttribute::Unmarked => "\\Unmarked".to_string(),
        NameAttribute::Extension(name) => name.to_string(),
        other => format!("\\{:?}", other),
    }
}

fn lossy(bytes: Option<&std::borrow::Cow<'_, [u8]>>) -> Option<String> {
    bytes.map(|s| String::from_utf8_lossy(s).into_owned())
}

fn convert_addresses(addrs: Option<&Vec<Address<'_>>>) -> Vec<EmailAddress> {
    addrs
        .map(|v| {
            v.iter()
                .filter_map(|a| {
                    let mailbox = lossy(a.mailbox.as_ref())?;
                    let address = match lossy(a.host.as_ref()) {
                        Some(host) if !host.is_empty() => format!("{}@{}", mailbox, host),
                        _ => mailbox,
                    };
                    Some(EmailAddress::new(lossy(a.name.as_ref()), address))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn convert_envelope(env: &imap_proto::types::Envelope<'_>) -> Envelope {
    Envelope {
        message_id: lossy(env.message_id.as_ref()),
        subject: lossy(env.subject.as_ref()),
        from: convert_addresses(env.from.as_ref()),
        date: lossy(env.date.as_ref()),
    }
}
