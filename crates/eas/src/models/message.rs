//! Message model materialized from sync items

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Server-assigned message identifier (ActiveSync ServerId)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Standard message flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flag {
    Seen,
    Flagged,
    Answered,
    Deleted,
    Draft,
}

impl Flag {
    /// Stable name used when persisting flags
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Seen => "SEEN",
            Flag::Flagged => "FLAGGED",
            Flag::Answered => "ANSWERED",
            Flag::Deleted => "DELETED",
            Flag::Draft => "DRAFT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SEEN" => Some(Flag::Seen),
            "FLAGGED" => Some(Flag::Flagged),
            "ANSWERED" => Some(Flag::Answered),
            "DELETED" => Some(Flag::Deleted),
            "DRAFT" => Some(Flag::Draft),
            _ => None,
        }
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Parse "John Doe <john@example.com>" or a bare address
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let (Some(start), Some(end)) = (s.rfind('<'), s.rfind('>')) {
            if start < end {
                let name = s[..start].trim().trim_matches('"');
                return Self {
                    name: (!name.is_empty()).then(|| name.to_string()),
                    email: s[start + 1..end].trim().to_string(),
                };
            }
        }

        Self::new(s)
    }

    /// Format the address for display or storage
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A message materialized from one sync item
///
/// Built once per item and handed to storage (or the caller) as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server id, also used as the local message id
    pub id: MessageId,
    /// Same as the server id
    pub uid: String,
    /// Server id of the folder this message was synced from
    pub folder_id: String,
    pub flags: BTreeSet<Flag>,
    pub subject: Option<String>,
    pub from: Option<EmailAddress>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Raw MIME payload as delivered (a prefix when truncated)
    pub raw: Vec<u8>,
}

impl Message {
    /// Parse raw MIME bytes into a message identified by `server_id`
    ///
    /// Header extraction is best effort: a payload the parser can't make
    /// sense of (e.g. a truncated prefix) still yields a message carrying
    /// the raw bytes.
    pub fn parse(folder_id: &str, server_id: &str, raw: &[u8]) -> Self {
        let mut message = Self {
            id: MessageId::new(server_id),
            uid: server_id.to_string(),
            folder_id: folder_id.to_string(),
            flags: BTreeSet::new(),
            subject: None,
            from: None,
            sent_at: None,
            raw: raw.to_vec(),
        };

        if let Some(parsed) = MessageParser::default().parse(raw) {
            message.subject = parsed.subject().map(str::to_string);
            message.from = parsed
                .from()
                .and_then(|addrs| addrs.first())
                .and_then(|addr| {
                    addr.address().map(|email| EmailAddress {
                        name: addr.name().map(str::to_string),
                        email: email.to_string(),
                    })
                });
            message.sent_at = parsed
                .date()
                .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
                .map(|d| d.with_timezone(&Utc));
        }

        message
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        if value {
            self.flags.insert(flag);
        } else {
            self.flags.remove(&flag);
        }
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_read(&self) -> bool {
        self.has_flag(Flag::Seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"From: Jane Roe <jane@example.com>\r\n\
Subject: Quarterly numbers\r\n\
Date: Tue, 1 Jul 2025 10:00:00 +0000\r\n\
\r\n\
See attached.\r\n";

    #[test]
    fn test_parse_extracts_headers() {
        let message = Message::parse("inbox", "5:7", RAW);

        assert_eq!(message.id.as_str(), "5:7");
        assert_eq!(message.uid, "5:7");
        assert_eq!(message.folder_id, "inbox");
        assert_eq!(message.subject.as_deref(), Some("Quarterly numbers"));

        let from = message.from.unwrap();
        assert_eq!(from.email, "jane@example.com");
        assert_eq!(from.name.as_deref(), Some("Jane Roe"));

        assert_eq!(message.sent_at.unwrap().to_rfc3339(), "2025-07-01T10:00:00+00:00");
        assert_eq!(message.raw, RAW);
        assert!(message.flags.is_empty());
    }

    #[test]
    fn test_parse_empty_payload_keeps_identity() {
        let message = Message::parse("inbox", "5:8", b"");
        assert_eq!(message.id.as_str(), "5:8");
        assert!(message.subject.is_none());
        assert!(message.raw.is_empty());
    }

    #[test]
    fn test_flags() {
        let mut message = Message::parse("inbox", "1", RAW);
        assert!(!message.is_read());

        message.set_flag(Flag::Seen, true);
        assert!(message.is_read());

        message.set_flag(Flag::Seen, false);
        assert!(!message.has_flag(Flag::Seen));
    }

    #[test]
    fn test_flag_names_round_trip() {
        for flag in [Flag::Seen, Flag::Flagged, Flag::Answered, Flag::Deleted, Flag::Draft] {
            assert_eq!(Flag::parse(flag.as_str()), Some(flag));
        }
        assert_eq!(Flag::parse("RECENT"), None);
    }

    #[test]
    fn test_email_address_parse() {
        let addr = EmailAddress::parse("\"John Doe\" <john@example.com>");
        assert_eq!(addr.name.as_deref(), Some("John Doe"));
        assert_eq!(addr.email, "john@example.com");
        assert_eq!(addr.display(), "John Doe <john@example.com>");

        let bare = EmailAddress::parse("  john@example.com ");
        assert_eq!(bare.name, None);
        assert_eq!(bare.display(), "john@example.com");
    }
}
