//! # mailgate-core
//!
//! A mail gateway over one IMAP mailbox and one SMTP submission account.
//!
//! This crate provides:
//! - Gateway configuration with provider presets and validation
//! - Long-lived store and transport sessions with reconnect on staleness
//! - Logical mailboxes (inbox, sent) resolved to provider folder names
//! - Lookup by `Message-ID`, subject search and listing
//! - Decomposition into envelope, body text and attachments
//! - Outbound composition for new messages and reply-all
//!
//! ```no_run
//! use mailgate_core::{GatewayConfig, MailGateway, Mailbox};
//!
//! # async fn run() -> mailgate_core::Result<()> {
//! let config = GatewayConfig::with_email("user@gmail.com").password("app-password");
//! let gateway = MailGateway::connect(config)?;
//! gateway.init().await?;
//!
//! for envelope in gateway.list_messages(Mailbox::Inbox).await? {
//!     println!("{} {}", envelope.message_id, envelope.subject);
//! }
//!
//! gateway.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
mod error;
mod model;
pub mod service;

pub use config::{
    AttachmentMatch, Endpoint, FolderConfig, GatewayConfig, ImapConfig, Security, SmtpConfig,
    ValidationError, ValidationResult, validate_config,
};
pub use error::{Error, Result};
pub use model::{Attachment, EmailEnvelope, Mailbox, OutgoingEmail, SendReceipt};
pub use service::{
    ConnectionManager, ConnectionState, FolderResolver, Lease, MailGateway, MessageLocator,
    MessageMapper, OpenFolder, OutboundComposer, PartKind, classify,
};
