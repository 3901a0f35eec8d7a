//! Envelope metadata fetched without message bodies

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: Option<String>, address: String) -> Self {
        Self { name, address }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) if !name.is_empty() => write!(f, "{} <{}>", name, self.address),
            _ => write!(f, "{}", self.address),
        }
    }
}

/// ENVELOPE fields the engine cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Message-ID header
    pub message_id: Option<String>,
    /// Subject line
    pub subject: Option<String>,
    /// From addresses
    pub from: Vec<EmailAddress>,
    /// Date header, unparsed
    pub date: Option<String>,
}

/// One FETCH response item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// Message sequence number
    pub seq: u32,
    /// Server-assigned UID, when the server reported it
    pub uid: Option<u32>,
    pub envelope: Envelope,
}

impl MessageHeader {
    /// Subject line, with a placeholder for missing ones
    pub fn subject(&self) -> &str {
        self.envelope
            .subject
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("(No subject)")
    }

    /// Primary sender, with a placeholder for missing ones
    pub fn sender(&self) -> String {
        self.envelope
            .from
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(Unknown sender)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        let named = EmailAddress::new(Some("Ada".into()), "ada@example.com".into());
        assert_eq!(named.to_string(), "Ada <ada@example.com>");

        let bare = EmailAddress::new(Some(String::new()), "bob@example.com".into());
        assert_eq!(bare.to_string(), "bob@example.com");
    }

    #[test]
    fn test_header_placeholders() {
        let mut header = MessageHeader {
            seq: 1,
            uid: None,
            envelope: Envelope::default(),
        };
        assert_eq!(header.subject(), "(No subject)");
        assert_eq!(header.sender(), "(Unknown sender)");

        header.envelope.subject = Some("Weekly report".into());
        header
            .envelope
            .from
            .push(EmailAddress::new(None, "boss@example.com".into()));
        assert_eq!(header.subject(), "Weekly report");
        assert_eq!(header.sender(), "boss@example.com");
    }
}
