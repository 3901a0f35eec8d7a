//! Error types for IMAP operations

use thiserror::Error;

/// Result type for IMAP operations
pub type ImapResult<T> = Result<T, ImapError>;

/// Errors that can occur during IMAP operations
#[derive(Debug, Error)]
pub enum ImapError {
    /// TCP connection could not be established
    #[error("Failed to connect to IMAP server: {0}")]
    ConnectionFailed(String),

    /// TLS handshake failed
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Server rejected the credentials
    #[error("IMAP authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server answered NO/BAD or the connection broke mid-command
    #[error("IMAP server error: {0}")]
    ServerError(String),

    /// SELECT was refused
    #[error("Mailbox not found: {0}")]
    MailboxNotFound(String),

    /// Response could not be parsed
    #[error("Failed to parse IMAP response: {0}")]
    ParseError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// No connection, or the connection was already closed
    #[error("IMAP session is not connected")]
    NotConnected,

    /// Command issued before LOGIN succeeded
    #[error("IMAP session is not authenticated")]
    NotAuthenticated,

    /// Connect or socket timeout elapsed
    #[error("Operation timed out")]
    Timeout,
}

impl ImapError {
    /// Whether the server refused the credentials, as opposed to a
    /// transport failure while logging in
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, ImapError::AuthenticationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejection() {
        assert!(ImapError::AuthenticationFailed("NO".into()).is_auth_rejection());
        assert!(!ImapError::Timeout.is_auth_rejection());
        assert!(!ImapError::ServerError("BYE".into()).is_auth_rejection());
    }

    #[test]
    fn test_display() {
        assert_eq!(ImapError::Timeout.to_string(), "Operation timed out");
        assert_eq!(
            ImapError::MailboxNotFound("Archive".into()).to_string(),
            "Mailbox not found: Archive"
        );
    }
}
