//! Outbound message composition.

use crate::address::{Address, format_address_list};
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::Message;
use chrono::{DateTime, FixedOffset, Local};

const REPLY_PREFIX: &str = "Re: ";
const MAX_LINE: usize = 78;

/// A file to attach to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// File name shown to the recipient.
    pub file_name: String,
    /// Content type header value, used verbatim.
    pub content_type: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
}

/// The serialized output of [`MessageBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltMessage {
    /// The `Message-ID` written into the headers, including angle brackets.
    pub message_id: String,
    /// Envelope recipients: To then Cc, without duplicates.
    pub recipients: Vec<Address>,
    /// RFC 5322 bytes with CRLF line endings.
    pub bytes: Vec<u8>,
}

/// Builder for `multipart/mixed` messages with an HTML body and attachments.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<Address>,
    to: Vec<Address>,
    cc: Vec<Address>,
    subject: String,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
    in_reply_to: Option<String>,
    references: Vec<String>,
    html_body: String,
    attachments: Vec<AttachmentPart>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a reply to `original`.
    ///
    /// Recipients go to `Reply-To` (or `From` when absent). With `reply_all`
    /// the original `To` recipients are added and the original `Cc` list is
    /// kept as `Cc`. Duplicates are dropped, comparing addresses without
    /// regard to case. The subject gains a single `Re: ` prefix and the
    /// threading headers point at the original message.
    ///
    /// # Errors
    ///
    /// Returns an error if the original has no address to reply to or if
    /// its address headers are malformed.
    pub fn reply(original: &Message, reply_all: bool) -> Result<Self> {
        let mut to = original.reply_to_addresses()?;
        if to.is_empty() {
            to = original.from_addresses()?;
        }
        if to.is_empty() {
            return Err(Error::MissingHeader("From".to_string()));
        }

        let mut cc = Vec::new();
        if reply_all {
            to.extend(original.to_addresses()?);
            cc = original.cc_addresses()?;
        }

        let to = dedupe(to, &[]);
        let cc = dedupe(cc, &to);

        let subject = original.subject();
        let subject = if subject
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"))
        {
            subject
        } else {
            format!("{REPLY_PREFIX}{subject}")
        };

        let mut references = original.references();
        if references.is_empty() {
            references.extend(original.in_reply_to());
        }
        let in_reply_to = original.message_id().map(str::to_string);
        references.extend(in_reply_to.clone());

        Ok(Self {
            to,
            cc,
            subject,
            in_reply_to,
            references,
            ..Self::default()
        })
    }

    /// Sets the sender.
    #[must_use]
    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Adds `To` recipients.
    #[must_use]
    pub fn to(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.to.extend(addresses);
        self
    }

    /// Adds `Cc` recipients.
    #[must_use]
    pub fn cc(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.cc.extend(addresses);
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the `Date` header. Defaults to the current local time.
    #[must_use]
    pub fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the `Message-ID`. One is generated when not set.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html_body = html.into();
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: AttachmentPart) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Returns the current `To` recipients.
    #[must_use]
    pub fn to_recipients(&self) -> &[Address] {
        &self.to
    }

    /// Returns the current `Cc` recipients.
    #[must_use]
    pub fn cc_recipients(&self) -> &[Address] {
        &self.cc
    }

    /// Returns the current subject.
    #[must_use]
    pub fn subject_text(&self) -> &str {
        &self.subject
    }

    /// Serializes the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender or all recipients are missing, or if
    /// an attachment content type is unusable as a header value.
    pub fn build(self) -> Result<BuiltMessage> {
        let from = self
            .from
            .ok_or_else(|| Error::MissingHeader("From".to_string()))?;
        if self.to.is_empty() && self.cc.is_empty() {
            return Err(Error::MissingHeader("To".to_string()));
        }
        for attachment in &self.attachments {
            validate_header_value(&attachment.content_type)?;
        }

        let message_id = self.message_id.unwrap_or_else(|| generate_message_id(&from));
        let date = self.date.unwrap_or_else(|| Local::now().fixed_offset());
        let boundary = format!("----=_Part_{}", uuid::Uuid::new_v4().simple());

        let mut headers = Headers::new();
        headers.add("Date", date.to_rfc2822());
        headers.add("From", from.to_header_value());
        if !self.to.is_empty() {
            headers.add("To", fold_addresses("To", &self.to));
        }
        if !self.cc.is_empty() {
            headers.add("Cc", fold_addresses("Cc", &self.cc));
        }
        headers.add("Message-ID", message_id.clone());
        if let Some(parent) = &self.in_reply_to {
            headers.add("In-Reply-To", parent.clone());
        }
        if !self.references.is_empty() {
            headers.add("References", self.references.join("\r\n "));
        }
        headers.add("Subject", encode_rfc2047(&self.subject));
        headers.add("MIME-Version", "1.0");
        headers.add("Content-Type", ContentType::multipart_mixed(&boundary).to_string());

        let mut out = headers.to_string();
        out.push_str("\r\n");

        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&format!("Content-Type: {}\r\n", ContentType::text_html()));
        out.push_str("Content-Transfer-Encoding: quoted-printable\r\n\r\n");
        out.push_str(&encode_quoted_printable(&self.html_body));
        out.push_str("\r\n");

        for attachment in &self.attachments {
            let content_type = if attachment.content_type.trim().is_empty() {
                "application/octet-stream"
            } else {
                attachment.content_type.trim()
            };
            let disposition = ContentDisposition::attachment(encode_rfc2047(&attachment.file_name));

            out.push_str(&format!("--{boundary}\r\n"));
            out.push_str(&format!("Content-Type: {content_type}\r\n"));
            out.push_str("Content-Transfer-Encoding: base64\r\n");
            out.push_str(&format!("Content-Disposition: {disposition}\r\n\r\n"));
            out.push_str(&encode_base64_wrapped(&attachment.content));
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{boundary}--\r\n"));

        let mut recipients = self.to;
        recipients.extend(self.cc);
        let recipients = dedupe(recipients, &[]);

        Ok(BuiltMessage {
            message_id,
            recipients,
            bytes: out.into_bytes(),
        })
    }
}

/// Keeps the first occurrence of each mailbox, skipping any in `exclude`.
fn dedupe(addresses: Vec<Address>, exclude: &[Address]) -> Vec<Address> {
    let mut kept: Vec<Address> = Vec::with_capacity(addresses.len());
    for address in addresses {
        let seen = kept
            .iter()
            .chain(exclude)
            .any(|other| other.same_mailbox(&address));
        if !seen {
            kept.push(address);
        }
    }
    kept
}

/// Formats an address list, folding onto continuation lines when long.
fn fold_addresses(name: &str, addresses: &[Address]) -> String {
    let single = format_address_list(addresses);
    if name.len() + 2 + single.len() <= MAX_LINE {
        return single;
    }
    addresses
        .iter()
        .map(Address::to_header_value)
        .collect::<Vec<_>>()
        .join(",\r\n ")
}

fn generate_message_id(from: &Address) -> String {
    let domain = from
        .email
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain);
    format!("<{}@{domain}>", uuid::Uuid::new_v4().simple())
}

fn validate_header_value(value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidContentType(value.escape_debug().to_string()));
    }
    if !value.trim().is_empty() {
        ContentType::parse(value)?;
    }
    Ok(())
}
