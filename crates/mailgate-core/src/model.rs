//! Domain types exchanged with gateway callers.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Logical mailbox identity, resolved to a provider folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mailbox {
    /// The incoming mail folder.
    Inbox,
    /// The sent mail folder.
    Sent,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
        })
    }
}

/// A file carried by a message, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name as declared by the sender.
    pub file_name: String,
    /// Content type header value.
    pub content_type: String,
    /// Decoded bytes.
    pub content: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            content,
        }
    }
}

/// Message metadata, plus body and attachments once decomposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEnvelope {
    /// `Message-ID` header value; never empty.
    pub message_id: String,
    /// Decoded subject, empty when absent.
    pub subject: String,
    /// First `From` mailbox, empty when absent.
    pub from_address: String,
    /// `To` mailboxes in header order.
    pub to_addresses: Vec<String>,
    /// `Cc` mailboxes in header order.
    pub cc_addresses: Vec<String>,
    /// `Date` header, if parseable.
    pub sent_date: Option<DateTime<FixedOffset>>,
    /// Whether the message carries the `\Seen` flag.
    pub is_read: bool,
    /// Concatenated text/plain and text/html parts; `None` for metadata-only envelopes.
    pub body_text: Option<String>,
    /// Non-text parts; always empty for metadata-only envelopes.
    pub attachments: Vec<Attachment>,
}

/// An outgoing message as supplied by a caller.
///
/// `to` and `cc` entries may each hold a single mailbox or a comma-separated
/// address list; they are parsed when the message is composed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub body_html: String,
    /// Files to attach.
    pub attachments: Vec<Attachment>,
}

impl OutgoingEmail {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(subject: impl Into<String>, body_html: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body_html: body_html.into(),
            ..Self::default()
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Adds a CC recipient.
    #[must_use]
    pub fn cc(mut self, recipient: impl Into<String>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// `Message-ID` of the sent message; usable with `get_message` once the
    /// provider files it in the sent folder.
    pub message_id: String,
    /// Envelope recipients the transport accepted the message for.
    pub recipients: Vec<String>,
}
