//! Outbound message composition.

use chrono::Local;
use mailgate_mime::{Address, AttachmentPart, Message, MessageBuilder, parse_address_list};
use tracing::debug;

use crate::backend::ComposedMessage;
use crate::model::{Attachment, OutgoingEmail};
use crate::{Error, Result};

/// Builds `multipart/mixed` messages from one sender identity.
///
/// The HTML body is always the first part, followed by one part per file.
#[derive(Debug, Clone)]
pub struct OutboundComposer {
    sender: Address,
}

impl OutboundComposer {
    /// Creates a composer sending as `sender`.
    #[must_use]
    pub const fn new(sender: Address) -> Self {
        Self { sender }
    }

    /// Returns the sender identity.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Composes a new message.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if an address does not parse or if there
    /// are no recipients at all.
    pub fn compose_new(&self, email: &OutgoingEmail) -> Result<ComposedMessage> {
        let to = parse_recipients(&email.to)?;
        let cc = parse_recipients(&email.cc)?;
        if to.is_empty() && cc.is_empty() {
            return Err(Error::InvalidInput("message has no recipients".to_string()));
        }

        let builder = MessageBuilder::new()
            .to(to)
            .cc(cc)
            .subject(email.subject.as_str());
        self.finish(builder, &email.body_html, &email.attachments)
    }

    /// Composes a reply to everyone on `original`.
    ///
    /// Recipients, subject and threading headers come from the original;
    /// the sender and date are this composer's.
    ///
    /// # Errors
    ///
    /// Returns `Error::Mime` if the original has nobody to reply to or its
    /// address headers are malformed.
    pub fn compose_reply(
        &self,
        original: &Message,
        body_html: &str,
        files: &[Attachment],
    ) -> Result<ComposedMessage> {
        let builder = MessageBuilder::reply(original, true)?;
        debug!(
            to = builder.to_recipients().len(),
            cc = builder.cc_recipients().len(),
            subject = builder.subject_text(),
            "reply derived"
        );
        self.finish(builder, body_html, files)
    }

    fn finish(
        &self,
        builder: MessageBuilder,
        body_html: &str,
        files: &[Attachment],
    ) -> Result<ComposedMessage> {
        let builder = files.iter().fold(
            builder
                .from(self.sender.clone())
                .date(Local::now().fixed_offset())
                .html_body(body_html),
            |builder, file| {
                builder.attach(AttachmentPart {
                    file_name: file.file_name.clone(),
                    content_type: file.content_type.clone(),
                    content: file.content.clone(),
                })
            },
        );

        let built = builder.build()?;
        Ok(ComposedMessage {
            sender: self.sender.clone(),
            message_id: built.message_id,
            recipients: built.recipients,
            bytes: built.bytes,
        })
    }
}

fn parse_recipients(entries: &[String]) -> Result<Vec<Address>> {
    let mut addresses = Vec::new();
    for entry in entries.iter().filter(|e| !e.trim().is_empty()) {
        let parsed = parse_address_list(entry)
            .map_err(|e| Error::InvalidInput(format!("{entry:?}: {e}")))?;
        addresses.extend(parsed);
    }
    Ok(addresses)
}
