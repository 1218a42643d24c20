//! Protocol seams between the gateway and the mail servers.
//!
//! The gateway only talks to these traits. Production sessions come from
//! [`ImapSmtpConnector`]; tests plug in in-memory fakes.

mod imap;
mod smtp;

use std::future::Future;

use mailgate_mime::Address;

use crate::Result;
use crate::config::GatewayConfig;

pub use imap::{ImapStore, ImapStream};
pub use smtp::LettreTransport;

/// Lifecycle shared by store and transport sessions.
pub trait Session: Send {
    /// Cheap liveness probe (IMAP `NOOP`, transport health flag).
    fn is_alive(&mut self) -> impl Future<Output = bool> + Send;

    /// Ends the session (IMAP `LOGOUT`, SMTP `QUIT`).
    fn disconnect(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Server-side search criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Every message in the folder.
    All,
    /// Messages whose `Message-ID` header contains the text.
    MessageId(String),
    /// Messages whose subject contains the text.
    Subject(String),
}

/// What a fetch retrieves alongside the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchProfile {
    /// The header section only.
    Envelope,
    /// The whole message, without setting `\Seen`.
    Full,
}

/// A message as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Sequence number within the open folder; not a stable identifier.
    pub seq: u32,
    /// Whether the `\Seen` flag is set.
    pub seen: bool,
    /// Raw RFC 5322 bytes: headers only for [`FetchProfile::Envelope`].
    pub raw: Vec<u8>,
}

/// Mailbox store operations (IMAP).
pub trait StoreSession: Session {
    /// Returns true if a folder with exactly this name exists.
    fn folder_exists(&mut self, name: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Opens a folder read-only, returning its message count.
    fn examine(&mut self, name: &str) -> impl Future<Output = Result<u32>> + Send;

    /// Closes the open folder without expunging.
    fn close_folder(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Searches the open folder, returning sequence numbers.
    fn search(&mut self, query: &SearchQuery) -> impl Future<Output = Result<Vec<u32>>> + Send;

    /// Fetches the given messages from the open folder in one round trip.
    fn fetch(
        &mut self,
        seqs: &[u32],
        profile: FetchProfile,
    ) -> impl Future<Output = Result<Vec<FetchedMessage>>> + Send;
}

/// A message ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    /// Envelope sender.
    pub sender: Address,
    /// `Message-ID` written into the headers.
    pub message_id: String,
    /// Envelope recipients (To and Cc, deduplicated).
    pub recipients: Vec<Address>,
    /// Serialized message.
    pub bytes: Vec<u8>,
}

/// Outbound transport operations (SMTP).
pub trait MailTransport: Session {
    /// Submits a message to exactly its recipients.
    fn send(&mut self, message: &ComposedMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Opens authenticated sessions.
pub trait Connector: Send + Sync {
    /// Store session type.
    type Store: StoreSession;
    /// Transport session type.
    type Transport: MailTransport;

    /// Opens and authenticates a store session.
    fn connect_store(&self) -> impl Future<Output = Result<Self::Store>> + Send;

    /// Opens and authenticates a transport session.
    fn connect_transport(&self) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Production connector: IMAP through `async-imap`, SMTP through `lettre`.
#[derive(Debug, Clone)]
pub struct ImapSmtpConnector {
    config: GatewayConfig,
}

impl ImapSmtpConnector {
    /// Creates a connector for the given configuration.
    #[must_use]
    pub const fn new(config: GatewayConfig) -> Self {
        Self { config }
    }
}

impl Connector for ImapSmtpConnector {
    type Store = ImapStore;
    type Transport = LettreTransport;

    async fn connect_store(&self) -> Result<ImapStore> {
        ImapStore::connect(&self.config.imap, self.config.io_timeout()).await
    }

    async fn connect_transport(&self) -> Result<LettreTransport> {
        LettreTransport::connect(&self.config.smtp, self.config.io_timeout()).await
    }
}
