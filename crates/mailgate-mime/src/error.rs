//! Errors raised while parsing or building messages.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Parsing and composition failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Content-Type` or `Content-Disposition` value that cannot be used.
    #[error("unusable content type {0:?}")]
    InvalidContentType(String),

    /// A Base64 body that does not decode.
    #[error("bad base64 body: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A multipart body whose content type names no boundary.
    #[error("multipart body has no boundary parameter")]
    MissingBoundary,

    /// A mailbox or address list that does not parse.
    #[error("unparseable address {0:?}")]
    InvalidAddress(String),

    /// A header needed to build or answer a message is absent.
    #[error("no {0} header")]
    MissingHeader(String),
}
