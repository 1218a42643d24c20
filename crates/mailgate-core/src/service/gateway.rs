//! The gateway facade.

use mailgate_mime::{Address, Message};
use tracing::{debug, info};

use super::composer::OutboundComposer;
use super::connection::ConnectionManager;
use super::folder::{FolderResolver, OpenFolder};
use super::locator::MessageLocator;
use super::mapper::MessageMapper;
use crate::backend::{ComposedMessage, Connector, FetchProfile, ImapSmtpConnector, MailTransport};
use crate::config::{AttachmentMatch, GatewayConfig, validate_config};
use crate::model::{Attachment, EmailEnvelope, Mailbox, OutgoingEmail, SendReceipt};
use crate::{Error, Result};

/// Read, search and send operations over one mail account.
///
/// Messages are addressed by their `Message-ID` header. Every read operation
/// opens its folder read-only and closes it before returning, whatever the
/// outcome. Sessions are opened on first use (or by [`MailGateway::init`])
/// and reopened when found stale.
pub struct MailGateway<C: Connector> {
    connections: ConnectionManager<C>,
    folders: FolderResolver,
    locator: MessageLocator,
    mapper: MessageMapper,
    composer: OutboundComposer,
    attachment_match: AttachmentMatch,
}

impl MailGateway<ImapSmtpConnector> {
    /// Creates a gateway that talks IMAP and SMTP as configured.
    ///
    /// No network I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` listing every invalid setting.
    pub fn connect(config: GatewayConfig) -> Result<Self> {
        validate_config(&config).map_err(Error::Config)?;
        let connector = ImapSmtpConnector::new(config.clone());
        Ok(Self::new(&config, connector))
    }
}

impl<C: Connector> MailGateway<C> {
    /// Creates a gateway over an arbitrary connector.
    pub fn new(config: &GatewayConfig, connector: C) -> Self {
        let sender = match &config.display_name {
            Some(name) if !name.trim().is_empty() => Address::with_name(name.trim(), &config.address),
            _ => Address::new(&config.address),
        };

        Self {
            connections: ConnectionManager::new(connector, config.connect_timeout()),
            folders: FolderResolver::new(&config.folders),
            locator: MessageLocator::new(),
            mapper: MessageMapper::new(),
            composer: OutboundComposer::new(sender),
            attachment_match: config.attachment_match,
        }
    }

    /// Returns the session manager.
    pub const fn connections(&self) -> &ConnectionManager<C> {
        &self.connections
    }

    /// Opens both sessions now instead of on first use.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if either session cannot be established.
    pub async fn init(&self) -> Result<()> {
        drop(self.connections.ensure_read_connected().await?);
        drop(self.connections.ensure_write_connected().await?);
        info!("gateway connected");
        Ok(())
    }

    /// Closes both sessions. Errors are logged, never returned.
    pub async fn shutdown(&self) {
        self.connections.shutdown().await;
        info!("gateway shut down");
    }

    /// Lists every message in a mailbox, metadata only.
    ///
    /// # Errors
    ///
    /// Returns connection, folder or store errors. An empty folder is an
    /// empty `Vec`.
    pub async fn list_messages(&self, mailbox: Mailbox) -> Result<Vec<EmailEnvelope>> {
        self.read(mailbox, async |store, folder| {
            let fetched = self.locator.all(store, folder).await?;
            Ok(fetched
                .iter()
                .filter_map(|message| self.mapper.to_envelope(message))
                .collect())
        })
        .await
    }

    /// Lists messages whose subject contains `text`, metadata only.
    ///
    /// # Errors
    ///
    /// Returns connection, folder or store errors. No match is an empty
    /// `Vec`.
    pub async fn search_by_subject(&self, mailbox: Mailbox, text: &str) -> Result<Vec<EmailEnvelope>> {
        self.read(mailbox, async |store, folder| {
            let fetched = self.locator.find_by_subject(store, folder, text).await?;
            Ok(fetched
                .iter()
                .filter_map(|message| self.mapper.to_envelope(message))
                .collect())
        })
        .await
    }

    /// Retrieves one message with its body and attachments.
    ///
    /// # Errors
    ///
    /// Returns connection, folder, store or decoding errors. An unknown id
    /// is `Ok(None)`.
    pub async fn get_message(&self, mailbox: Mailbox, message_id: &str) -> Result<Option<EmailEnvelope>> {
        self.read(mailbox, async |store, folder| {
            let found = self
                .locator
                .find_by_message_id(store, folder, message_id, FetchProfile::Full)
                .await?;
            found.map_or(Ok(None), |message| self.mapper.to_envelope_with_body(&message))
        })
        .await
    }

    /// Retrieves one attachment of a message.
    ///
    /// With [`AttachmentMatch::ExactName`] the attachment whose file name
    /// equals `file_name` is returned; with [`AttachmentMatch::First`] the
    /// first attachment is returned whatever its name.
    ///
    /// # Errors
    ///
    /// Same as [`MailGateway::get_message`]. An unknown message or a
    /// missing attachment is `Ok(None)`.
    pub async fn download_attachment(
        &self,
        mailbox: Mailbox,
        message_id: &str,
        file_name: &str,
    ) -> Result<Option<Attachment>> {
        let Some(envelope) = self.get_message(mailbox, message_id).await? else {
            return Ok(None);
        };

        let total = envelope.attachments.len();
        let mut attachments = envelope.attachments.into_iter();
        let found = match self.attachment_match {
            AttachmentMatch::ExactName => attachments.find(|a| a.file_name == file_name),
            AttachmentMatch::First => attachments.next(),
        };
        debug!(
            message_id,
            file_name,
            total,
            found = found.is_some(),
            "attachment lookup"
        );
        Ok(found)
    }

    /// Sends a new message.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for unusable recipients, or connection
    /// and `Error::Send` errors from the transport.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let composed = self.composer.compose_new(email)?;
        self.submit(composed).await
    }

    /// Replies to the sender and every recipient of a message.
    ///
    /// # Errors
    ///
    /// Returns `Error::MessageNotFound` if no message has `message_id`, or
    /// the errors of [`MailGateway::send`].
    pub async fn reply_all(
        &self,
        mailbox: Mailbox,
        message_id: &str,
        body_html: &str,
        files: &[Attachment],
    ) -> Result<SendReceipt> {
        let original = self
            .read(mailbox, async |store, folder| {
                self.locator
                    .find_by_message_id(store, folder, message_id, FetchProfile::Envelope)
                    .await
            })
            .await?
            .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))?;

        let original = Message::parse(&original.raw);
        let composed = self.composer.compose_reply(&original, body_html, files)?;
        self.submit(composed).await
    }

    /// Runs `body` inside an open folder on the store session.
    ///
    /// The store lease is released before this returns, so callers never
    /// hold it while taking the transport lease.
    async fn read<T, F>(&self, mailbox: Mailbox, body: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut C::Store, &OpenFolder) -> Result<T>,
    {
        let mut lease = self.connections.ensure_read_connected().await?;
        let result = match lease.session() {
            Ok(store) => self.folders.with_folder(store, mailbox, body).await,
            Err(error) => Err(error),
        };
        lease.settle(&result);
        result
    }

    async fn submit(&self, composed: ComposedMessage) -> Result<SendReceipt> {
        let mut lease = self.connections.ensure_write_connected().await?;
        let result = match lease.session() {
            Ok(transport) => transport.send(&composed).await,
            Err(error) => Err(error),
        };
        lease.settle(&result);
        result?;

        info!(
            message_id = %composed.message_id,
            recipients = composed.recipients.len(),
            "message sent"
        );
        Ok(SendReceipt {
            message_id: composed.message_id,
            recipients: composed
                .recipients
                .into_iter()
                .map(|address| address.email)
                .collect(),
        })
    }
}
