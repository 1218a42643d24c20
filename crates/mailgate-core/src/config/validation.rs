//! Configuration validation.
//!
//! [`validate_config`] reports every problem at once so a caller can show
//! the whole list instead of failing on the first field.

use std::fmt;

use mailgate_mime::Address;

use super::model::GatewayConfig;

/// The server a setting belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The IMAP store.
    Imap,
    /// The SMTP transport.
    Smtp,
}

impl Endpoint {
    const fn key(self) -> &'static str {
        match self {
            Self::Imap => "imap",
            Self::Smtp => "smtp",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Imap => "IMAP",
            Self::Smtp => "SMTP",
        })
    }
}

/// A single invalid setting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No account address.
    #[error("account address is required")]
    MissingAddress,
    /// The account address is not a single mailbox.
    #[error("account address {0:?} is not a valid mailbox")]
    MalformedAddress(String),
    /// No server host.
    #[error("{0} host is required")]
    MissingHost(Endpoint),
    /// Port zero.
    #[error("{0} port must be non-zero")]
    ZeroPort(Endpoint),
    /// No login name.
    #[error("{0} username is required")]
    MissingUsername(Endpoint),
    /// No password.
    #[error("{0} password is required")]
    MissingPassword(Endpoint),
    /// No inbox folder name.
    #[error("inbox folder name is required")]
    MissingInbox,
    /// Every sent folder candidate is blank.
    #[error("at least one sent folder name is required")]
    NoSentCandidates,
    /// A timeout of zero seconds; carries the setting name.
    #[error("{0} must be at least one second")]
    ZeroTimeout(&'static str),
}

impl ValidationError {
    /// Dotted path of the offending setting, e.g. `smtp.port`.
    #[must_use]
    pub fn field(&self) -> String {
        match self {
            Self::MissingAddress | Self::MalformedAddress(_) => "address".to_string(),
            Self::MissingHost(endpoint) => format!("{}.host", endpoint.key()),
            Self::ZeroPort(endpoint) => format!("{}.port", endpoint.key()),
            Self::MissingUsername(endpoint) => format!("{}.username", endpoint.key()),
            Self::MissingPassword(endpoint) => format!("{}.password", endpoint.key()),
            Self::MissingInbox => "folders.inbox".to_string(),
            Self::NoSentCandidates => "folders.sent_candidates".to_string(),
            Self::ZeroTimeout(name) => (*name).to_string(),
        }
    }
}

/// Outcome of [`validate_config`].
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Checks a gateway configuration.
///
/// # Errors
///
/// Returns every invalid setting, in declaration order.
pub fn validate_config(config: &GatewayConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let address = config.address.trim();
    if address.is_empty() {
        errors.push(ValidationError::MissingAddress);
    } else if Address::parse(address).is_err() {
        errors.push(ValidationError::MalformedAddress(address.to_string()));
    }

    check_server(
        &mut errors,
        Endpoint::Imap,
        &config.imap.host,
        config.imap.port,
        &config.imap.username,
        &config.imap.password,
    );
    check_server(
        &mut errors,
        Endpoint::Smtp,
        &config.smtp.host,
        config.smtp.port,
        &config.smtp.username,
        &config.smtp.password,
    );

    if config.folders.inbox.trim().is_empty() {
        errors.push(ValidationError::MissingInbox);
    }
    if config
        .folders
        .sent_candidates
        .iter()
        .all(|name| name.trim().is_empty())
    {
        errors.push(ValidationError::NoSentCandidates);
    }

    for (name, secs) in [
        ("connect_timeout_secs", config.connect_timeout_secs),
        ("io_timeout_secs", config.io_timeout_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_server(
    errors: &mut Vec<ValidationError>,
    endpoint: Endpoint,
    host: &str,
    port: u16,
    username: &str,
    password: &str,
) {
    if host.trim().is_empty() {
        errors.push(ValidationError::MissingHost(endpoint));
    }
    if port == 0 {
        errors.push(ValidationError::ZeroPort(endpoint));
    }
    if username.trim().is_empty() {
        errors.push(ValidationError::MissingUsername(endpoint));
    }
    // Passwords may legitimately be all whitespace
    if password.is_empty() {
        errors.push(ValidationError::MissingPassword(endpoint));
    }
}
