//! Local store extension point
//!
//! The engine asks the store how far back each mailbox still needs to be
//! searched and reports every envelope it fetched. Persisting mail is not
//! implemented; [`NullStore`] remembers nothing.

use std::sync::Arc;

use chrono::NaiveDate;
use mailsync_imap::MessageHeader;
use tracing::debug;

use crate::config::LocalTarget;

/// Per-account local mail storage
pub trait LocalStore: Send + Sync + 'static {
    /// Date of the newest message already stored for `mailbox`
    fn high_water_mark(&self, account: &str, mailbox: &str) -> Option<NaiveDate>;

    /// Called for every envelope fetched from `mailbox`
    fn record(&self, account: &str, mailbox: &str, header: &MessageHeader);
}

/// Store that keeps nothing, so every pass searches the full window
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl LocalStore for NullStore {
    fn high_water_mark(&self, _account: &str, _mailbox: &str) -> Option<NaiveDate> {
        None
    }

    fn record(&self, _account: &str, _mailbox: &str, _header: &MessageHeader) {}
}

/// Open the store configured for an account
pub fn open(target: &LocalTarget) -> Arc<dyn LocalStore> {
    debug!(
        kind = %target.kind,
        folder = %target.folder.display(),
        "Local store not implemented, envelopes are not persisted"
    );
    Arc::new(NullStore)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_store_has_no_high_water_mark() {
        let store = open(&LocalTarget {
            kind: "maildir".into(),
            folder: "/tmp/mail".into(),
        });
        store.record("work", "INBOX", &MessageHeader::default());
        assert_eq!(store.high_water_mark("work", "INBOX"), None);
    }
}
