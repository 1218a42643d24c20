//! Error types for the gateway.

use thiserror::Error;

use crate::config::ValidationError;

/// Errors surfaced by gateway operations.
///
/// Absence is never an error on the read path: an empty search is an empty
/// `Vec` and an unknown id is `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication or network failure while establishing a session.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// No candidate folder name exists for a mailbox.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// The message a write operation depends on does not exist.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// A message part could not be read or decoded.
    #[error("Attachment I/O error: {0}")]
    AttachmentIo(String),

    /// The transport rejected or could not deliver a message.
    #[error("Send failed: {0}")]
    Send(String),

    /// The store answered a command with an error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A network operation exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Caller-supplied data is unusable (malformed address, no recipients).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration failed validation.
    #[error("Invalid configuration: {}", join_messages(.0))]
    Config(Vec<ValidationError>),

    /// Configuration could not be (de)serialized.
    #[error("Configuration format error: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    /// MIME parsing or composition failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailgate_mime::Error),
}

impl Error {
    /// Returns true if the session that produced this error must be dropped.
    #[must_use]
    pub const fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
