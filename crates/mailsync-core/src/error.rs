//! Classified errors
//!
//! Every retry decision in the engine looks at an [`ErrorKind`], never at
//! the message or the wrapped cause.

use std::fmt;
use std::sync::Arc;

use mailsync_imap::ImapError;

/// Result type for engine operations
pub type SyncResult<T> = Result<T, Error>;

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Closed set of failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    None,
    /// Unclassified error from a collaborator
    Foreign,
    Internal,
    /// The account's cancellation token fired
    ContextClosed,
    LoginFailed,
    ConnectFailed,
    ListMailboxFailed,
    ListMailFailed,
    SelectFailed,
    FetchFailed,
}

impl ErrorKind {
    /// Fixed human-readable description
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::None => "no error",
            ErrorKind::Foreign => "foreign error",
            ErrorKind::Internal => "internal error",
            ErrorKind::ContextClosed => "context closed",
            ErrorKind::LoginFailed => "login failed, check your username and password",
            ErrorKind::ConnectFailed => "connect to server failed",
            ErrorKind::ListMailboxFailed => "list mailboxes failed",
            ErrorKind::ListMailFailed => "list mail failed",
            ErrorKind::SelectFailed => "select mailbox failed",
            ErrorKind::FetchFailed => "fetch mail failed",
        }
    }

    /// Kinds that stop every retry loop immediately
    pub fn is_permanent(self) -> bool {
        matches!(self, ErrorKind::ContextClosed | ErrorKind::LoginFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A classified error with an optional underlying cause.
///
/// Cheap to clone so a finished sync result can be handed to every waiter.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    cause: Option<Cause>,
}

impl Error {
    /// Error of `kind` without a cause
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, cause: None }
    }

    /// Error of `kind` wrapping `cause`
    pub fn with_cause<E>(kind: ErrorKind, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            cause: Some(Arc::from(cause.into())),
        }
    }

    pub fn foreign<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_cause(ErrorKind::Foreign, cause)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_cause(ErrorKind::Internal, message.into())
    }

    pub fn context_closed() -> Self {
        Self::new(ErrorKind::ContextClosed)
    }

    pub fn login<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_cause(ErrorKind::LoginFailed, cause)
    }

    pub fn connect<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_cause(ErrorKind::ConnectFailed, cause)
    }

    pub fn list_mailbox<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_cause(ErrorKind::ListMailboxFailed, cause)
    }

    pub fn list_mail<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_cause(ErrorKind::ListMailFailed, cause)
    }

    pub fn select<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_cause(ErrorKind::SelectFailed, cause)
    }

    pub fn fetch<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_cause(ErrorKind::FetchFailed, cause)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// See [`ErrorKind::is_permanent`]
    pub fn is_permanent(&self) -> bool {
        self.kind.is_permanent()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.kind, cause),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<ImapError> for Error {
    fn from(e: ImapError) -> Self {
        Error::foreign(e)
    }
}

/// Kind of any error value; errors from outside this taxonomy are foreign
pub fn classify(err: &(dyn std::error::Error + 'static)) -> ErrorKind {
    err.downcast_ref::<Error>()
        .map_or(ErrorKind::Foreign, Error::kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_and_without_cause() {
        assert_eq!(Error::context_closed().to_string(), "context closed");
        assert_eq!(
            Error::connect(ImapError::Timeout).to_string(),
            "connect to server failed: Operation timed out"
        );
        assert_eq!(
            Error::internal("sync already running").to_string(),
            "internal error: sync already running"
        );
    }

    #[test]
    fn test_classify() {
        let login = Error::login(ImapError::AuthenticationFailed("NO LOGIN".into()));
        assert_eq!(classify(&login), ErrorKind::LoginFailed);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(classify(&io), ErrorKind::Foreign);

        let wrapped: Error = ImapError::NotConnected.into();
        assert_eq!(classify(&wrapped), ErrorKind::Foreign);
    }

    #[test]
    fn test_permanent_kinds() {
        assert!(Error::context_closed().is_permanent());
        assert!(Error::login("rejected").is_permanent());
        for err in [
            Error::connect("refused"),
            Error::foreign("?"),
            Error::list_mailbox("x"),
            Error::list_mail("x"),
            Error::select("x"),
            Error::fetch("x"),
            Error::internal("x"),
        ] {
            assert!(!err.is_permanent(), "{} should be retried", err);
        }
    }

    #[test]
    fn test_source_is_cause() {
        use std::error::Error as _;

        let err = Error::select(ImapError::MailboxNotFound("Spam".into()));
        let source = err.source().expect("cause");
        assert_eq!(source.to_string(), "Mailbox not found: Spam");
        assert!(Error::context_closed().source().is_none());
    }

    #[test]
    fn test_clone_shares_cause() {
        let err = Error::fetch(ImapError::Timeout);
        let copy = err.clone();
        assert_eq!(copy.kind(), ErrorKind::FetchFailed);
        assert_eq!(copy.to_string(), err.to_string());
    }
}
