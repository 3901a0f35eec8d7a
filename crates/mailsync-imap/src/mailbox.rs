//! Mailbox listing and status

/// A mailbox as reported by LIST, optionally enriched by SELECT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Full mailbox name, including hierarchy
    pub name: String,
    /// Hierarchy delimiter (e.g. '/' or '.')
    pub delimiter: Option<char>,
    /// LIST attributes such as `\Noselect` or `\HasChildren`
    pub attributes: Vec<String>,
    /// Message count from SELECT
    pub exists: Option<u32>,
    /// UIDVALIDITY from SELECT
    pub uid_validity: Option<u32>,
    /// UIDNEXT from SELECT
    pub uid_next: Option<u32>,
}

impl Mailbox {
    /// Build a mailbox from a LIST response line
    pub fn new(name: impl Into<String>, delimiter: Option<char>, attributes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            delimiter,
            attributes,
            exists: None,
            uid_validity: None,
            uid_next: None,
        }
    }

    /// Whether SELECT can be issued on this mailbox
    pub fn is_selectable(&self) -> bool {
        !self.attributes.iter().any(|a| {
            a.eq_ignore_ascii_case("\\noselect") || a.eq_ignore_ascii_case("\\nonexistent")
        })
    }

    /// Total messages reported by the last SELECT
    pub fn message_count(&self) -> u32 {
        self.exists.unwrap_or(0)
    }
}
