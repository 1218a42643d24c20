//! Conversion from fetched messages to [`EmailEnvelope`] values.

use mailgate_mime::{ContentType, Message, Part, encoding::decode_rfc2047};
use tracing::{debug, warn};

use crate::backend::FetchedMessage;
use crate::model::{Attachment, EmailEnvelope};
use crate::{Error, Result};

const DEFAULT_ATTACHMENT_TYPE: &str = "application/octet-stream";

/// How a message part is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// Appended to the body text.
    BodyText,
    /// Returned as an [`Attachment`].
    Attachment,
}

/// Classifies a part by its `Content-Type` header value.
///
/// Only `text/plain` and `text/html` are body text; a missing header means
/// `text/plain`. Everything else, including unparseable values and nested
/// multiparts, is an attachment.
#[must_use]
pub fn classify(content_type: Option<&str>) -> PartKind {
    let Some(value) = content_type else {
        return PartKind::BodyText;
    };
    match ContentType::parse(value) {
        Ok(ct) if ct.is("text", "plain") || ct.is("text", "html") => PartKind::BodyText,
        _ => PartKind::Attachment,
    }
}

/// Builds envelopes from raw messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageMapper;

impl MessageMapper {
    /// Creates a mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds a metadata-only envelope.
    ///
    /// Returns `None` for a message without a `Message-ID`, since it cannot
    /// be addressed later.
    #[must_use]
    pub fn to_envelope(&self, fetched: &FetchedMessage) -> Option<EmailEnvelope> {
        let message = Message::parse(&fetched.raw);
        envelope(&message, fetched)
    }

    /// Builds an envelope with body text and attachments.
    ///
    /// # Errors
    ///
    /// Returns `Error::AttachmentIo` if a part cannot be decoded.
    pub fn to_envelope_with_body(&self, fetched: &FetchedMessage) -> Result<Option<EmailEnvelope>> {
        let message = Message::parse(&fetched.raw);
        let Some(mut envelope) = envelope(&message, fetched) else {
            return Ok(None);
        };

        let (body, attachments) = decompose(&message)?;
        debug!(
            message_id = %envelope.message_id,
            body_len = body.len(),
            attachments = attachments.len(),
            "message decomposed"
        );
        envelope.body_text = Some(body);
        envelope.attachments = attachments;
        Ok(Some(envelope))
    }
}

fn envelope(message: &Message, fetched: &FetchedMessage) -> Option<EmailEnvelope> {
    let Some(message_id) = message.message_id() else {
        warn!(seq = fetched.seq, "skipping message without Message-ID");
        return None;
    };

    Some(EmailEnvelope {
        message_id: message_id.to_string(),
        subject: message.subject(),
        from_address: address_strings(message, "From")
            .into_iter()
            .next()
            .unwrap_or_default(),
        to_addresses: address_strings(message, "To"),
        cc_addresses: address_strings(message, "Cc"),
        sent_date: message.date(),
        is_read: fetched.seen,
        body_text: None,
        attachments: Vec::new(),
    })
}

/// Bare `local@domain` addresses of a header, keeping the decoded raw value
/// when it does not parse as an address list.
fn address_strings(message: &Message, header: &str) -> Vec<String> {
    match message.addresses(header) {
        Ok(addresses) => addresses.into_iter().map(|address| address.email).collect(),
        Err(error) => {
            debug!(header, %error, "unparseable address header");
            message
                .headers
                .get_all(header)
                .into_iter()
                .map(|value| decode_rfc2047(value.trim()))
                .filter(|value| !value.is_empty())
                .collect()
        }
    }
}

/// Splits a message into body text and attachments.
///
/// Only direct children of a multipart are walked; a nested multipart is
/// returned as one attachment holding its raw bytes. A single-part message
/// of any `text/*` type is all body.
fn decompose(message: &Message) -> Result<(String, Vec<Attachment>)> {
    let parts = message.parts().map_err(part_error)?;
    let single = !message.is_multipart();

    let mut body = String::new();
    let mut attachments = Vec::new();
    for part in &parts {
        let kind = if single && part.content_type().is_ok_and(|ct| ct.is_text()) {
            PartKind::BodyText
        } else {
            classify(part.content_type_raw())
        };
        match kind {
            PartKind::BodyText => body.push_str(&part.text().map_err(part_error)?),
            PartKind::Attachment => attachments.push(attachment(part, attachments.len() + 1)?),
        }
    }
    Ok((body, attachments))
}

fn attachment(part: &Part, position: usize) -> Result<Attachment> {
    let content = part.decode_body().map_err(part_error)?;
    let file_name = part
        .filename()
        .unwrap_or_else(|| format!("attachment-{position}"));
    let content_type = part
        .content_type_raw()
        .map_or(DEFAULT_ATTACHMENT_TYPE, str::trim)
        .to_string();
    Ok(Attachment {
        file_name,
        content_type,
        content,
    })
}

fn part_error(error: mailgate_mime::Error) -> Error {
    Error::AttachmentIo(error.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fetched(raw: &str, seen: bool) -> FetchedMessage {
        FetchedMessage {
            seq: 1,
            seen,
            raw: raw.as_bytes().to_vec(),
        }
    }

    #[test]
    fn classify_body_types() {
        assert_eq!(classify(Some("text/plain")), PartKind::BodyText);
        assert_eq!(classify(Some("TEXT/HTML; charset=UTF-8")), PartKind::BodyText);
        assert_eq!(classify(None), PartKind::BodyText);
    }

    #[test]
    fn classify_attachment_types() {
        assert_eq!(classify(Some("application/pdf")), PartKind::Attachment);
        assert_eq!(classify(Some("image/png; name=a.png")), PartKind::Attachment);
        assert_eq!(classify(Some("text/calendar")), PartKind::Attachment);
        assert_eq!(
            classify(Some("multipart/alternative; boundary=x")),
            PartKind::Attachment
        );
        assert_eq!(classify(Some("garbage")), PartKind::Attachment);
        assert_eq!(classify(Some("")), PartKind::Attachment);
    }

    #[test]
    fn envelope_metadata() {
        let raw = "Message-ID: <m1@example.com>\r\n\
                   Subject: =?UTF-8?B?SMOpbGxv?=\r\n\
                   From: \"Alice\" <alice@example.com>\r\n\
                   To: Bob <bob@example.com>, carol@example.com\r\n\
                   Cc: =?UTF-8?Q?D=C3=A9sir=C3=A9e?= <desiree@example.com>\r\n\
                   Date: Tue, 1 Jul 2025 10:00:00 +0000\r\n\
                   \r\n\
                   body";
        let envelope = MessageMapper::new().to_envelope(&fetched(raw, true)).unwrap();

        assert_eq!(envelope.message_id, "<m1@example.com>");
        assert_eq!(envelope.subject, "Héllo");
        assert_eq!(envelope.from_address, "alice@example.com");
        assert_eq!(
            envelope.to_addresses,
            vec!["bob@example.com", "carol@example.com"]
        );
        assert_eq!(envelope.cc_addresses, vec!["desiree@example.com"]);
        assert!(envelope.is_read);
        assert!(envelope.sent_date.is_some());
        assert!(envelope.body_text.is_none());
    }

    #[test]
    fn envelope_requires_message_id() {
        let raw = "Subject: nothing\r\n\r\nbody";
        assert!(MessageMapper::new().to_envelope(&fetched(raw, false)).is_none());
    }

    #[test]
    fn single_part_text_is_body() {
        let raw = "Message-ID: <m2@example.com>\r\n\
                   Content-Type: text/plain; charset=utf-8\r\n\
                   \r\n\
                   just text";
        let envelope = MessageMapper::new()
            .to_envelope_with_body(&fetched(raw, false))
            .unwrap()
            .unwrap();
        assert_eq!(envelope.body_text.as_deref(), Some("just text"));
        assert!(envelope.attachments.is_empty());
    }

    #[test]
    fn single_part_calendar_is_body() {
        let raw = "Message-ID: <m6@example.com>\r\n\
                   Content-Type: text/calendar; method=REQUEST\r\n\
                   \r\n\
                   BEGIN:VCALENDAR";
        let envelope = MessageMapper::new()
            .to_envelope_with_body(&fetched(raw, false))
            .unwrap()
            .unwrap();
        assert_eq!(envelope.body_text.as_deref(), Some("BEGIN:VCALENDAR"));
        assert!(envelope.attachments.is_empty());
    }

    #[test]
    fn calendar_part_of_multipart_is_attachment() {
        let raw = "Message-ID: <m7@example.com>\r\n\
                   Content-Type: multipart/mixed; boundary=\"b\"\r\n\
                   \r\n\
                   --b\r\n\
                   Content-Type: text/plain\r\n\
                   \r\n\
                   Invite attached\r\n\
                   --b\r\n\
                   Content-Type: text/calendar; name=\"invite.ics\"\r\n\
                   \r\n\
                   BEGIN:VCALENDAR\r\n\
                   --b--\r\n";
        let envelope = MessageMapper::new()
            .to_envelope_with_body(&fetched(raw, false))
            .unwrap()
            .unwrap();
        assert_eq!(envelope.body_text.as_deref(), Some("Invite attached"));
        assert_eq!(envelope.attachments.len(), 1);
        assert_eq!(envelope.attachments[0].file_name, "invite.ics");
        assert_eq!(envelope.attachments[0].content, b"BEGIN:VCALENDAR");
    }

    #[test]
    fn multipart_body_parts_concatenate_in_order() {
        let raw = "Message-ID: <m3@example.com>\r\n\
                   Content-Type: multipart/mixed; boundary=\"b\"\r\n\
                   \r\n\
                   --b\r\n\
                   Content-Type: text/plain\r\n\
                   \r\n\
                   plain\r\n\
                   --b\r\n\
                   Content-Type: image/png\r\n\
                   Content-Transfer-Encoding: base64\r\n\
                   \r\n\
                   AAEC\r\n\
                   --b\r\n\
                   Content-Type: text/html\r\n\
                   \r\n\
                   <b>html</b>\r\n\
                   --b--\r\n";
        let envelope = MessageMapper::new()
            .to_envelope_with_body(&fetched(raw, false))
            .unwrap()
            .unwrap();

        assert_eq!(envelope.body_text.as_deref(), Some("plain<b>html</b>"));
        assert_eq!(envelope.attachments.len(), 1);
        assert_eq!(envelope.attachments[0].file_name, "attachment-1");
        assert_eq!(envelope.attachments[0].content_type, "image/png");
        assert_eq!(envelope.attachments[0].content, vec![0, 1, 2]);
    }

    #[test]
    fn nested_multipart_is_one_attachment() {
        let raw = "Message-ID: <m4@example.com>\r\n\
                   Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
                   \r\n\
                   --outer\r\n\
                   Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
                   \r\n\
                   --inner\r\n\
                   Content-Type: text/plain\r\n\
                   \r\n\
                   hidden\r\n\
                   --inner--\r\n\
                   --outer--\r\n";
        let envelope = MessageMapper::new()
            .to_envelope_with_body(&fetched(raw, false))
            .unwrap()
            .unwrap();

        assert_eq!(envelope.body_text.as_deref(), Some(""));
        assert_eq!(envelope.attachments.len(), 1);
        assert!(
            envelope.attachments[0]
                .content_type
                .starts_with("multipart/alternative")
        );
    }

    #[test]
    fn bad_base64_is_attachment_io() {
        let raw = "Message-ID: <m5@example.com>\r\n\
                   Content-Type: multipart/mixed; boundary=\"b\"\r\n\
                   \r\n\
                   --b\r\n\
                   Content-Type: application/pdf\r\n\
                   Content-Transfer-Encoding: base64\r\n\
                   \r\n\
                   !!!not base64!!!\r\n\
                   --b--\r\n";
        let result = MessageMapper::new().to_envelope_with_body(&fetched(raw, false));
        assert!(matches!(result, Err(Error::AttachmentIo(_))));
    }
}
