//! Gateway configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IO_TIMEOUT_SECS: u64 = 60;

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

/// IMAP (store) server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImapConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (993 for TLS, 143 otherwise).
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl ImapConfig {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::None | Security::StartTls => 143,
            Security::Tls => 993,
        }
    }
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: Self::default_port(Security::Tls),
            security: Security::Tls,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// SMTP (transport) server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (587 for STARTTLS, 465 for TLS, 25 for none).
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl SmtpConfig {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::None => 25,
            Security::StartTls => 587,
            Security::Tls => 465,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: Self::default_port(Security::StartTls),
            security: Security::StartTls,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Provider folder names for each logical mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    /// Inbox folder name.
    pub inbox: String,
    /// Sent folder names, tried in order; the first that exists wins.
    pub sent_candidates: Vec<String>,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            inbox: "INBOX".to_string(),
            sent_candidates: vec!["[Gmail]/Sent Mail".to_string(), "Sent".to_string()],
        }
    }
}

/// How `download_attachment` picks an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttachmentMatch {
    /// The first attachment whose file name equals the requested one.
    #[default]
    ExactName,
    /// The first attachment of the message, whatever its name.
    First,
}

/// Complete gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Account address, used as the sender of outgoing mail.
    pub address: String,
    /// Optional sender display name.
    pub display_name: Option<String>,
    /// Store settings.
    pub imap: ImapConfig,
    /// Transport settings.
    pub smtp: SmtpConfig,
    /// Folder names.
    pub folders: FolderConfig,
    /// Seconds allowed for establishing a session.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a single network command.
    pub io_timeout_secs: u64,
    /// Attachment download matching mode.
    pub attachment_match: AttachmentMatch,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            display_name: None,
            imap: ImapConfig::default(),
            smtp: SmtpConfig::default(),
            folders: FolderConfig::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
            attachment_match: AttachmentMatch::default(),
        }
    }
}

impl GatewayConfig {
    /// Create configuration with common defaults for well-known providers.
    ///
    /// Unknown domains get `imap.<domain>` / `smtp.<domain>` with the
    /// standard secure ports.
    #[must_use]
    pub fn with_email(email: &str) -> Self {
        let mut config = Self {
            address: email.to_string(),
            ..Default::default()
        };

        if let Some(domain) = email.split('@').nth(1) {
            let domain = domain.to_lowercase();
            match domain.as_str() {
                "gmail.com" | "googlemail.com" => {
                    config.imap.host = "imap.gmail.com".to_string();
                    config.smtp.host = "smtp.gmail.com".to_string();
                }
                "outlook.com" | "hotmail.com" | "live.com" => {
                    config.imap.host = "outlook.office365.com".to_string();
                    config.smtp.host = "smtp.office365.com".to_string();
                    config.folders.sent_candidates =
                        vec!["Sent Items".to_string(), "Sent".to_string()];
                }
                "yahoo.com" | "ymail.com" => {
                    config.imap.host = "imap.mail.yahoo.com".to_string();
                    config.smtp.host = "smtp.mail.yahoo.com".to_string();
                    config.smtp.security = Security::Tls;
                    config.smtp.port = SmtpConfig::default_port(Security::Tls);
                    config.folders.sent_candidates = vec!["Sent".to_string()];
                }
                "icloud.com" | "me.com" | "mac.com" => {
                    config.imap.host = "imap.mail.me.com".to_string();
                    config.smtp.host = "smtp.mail.me.com".to_string();
                    config.folders.sent_candidates =
                        vec!["Sent Messages".to_string(), "Sent".to_string()];
                }
                _ => {
                    config.imap.host = format!("imap.{domain}");
                    config.smtp.host = format!("smtp.{domain}");
                }
            }
        }

        // Set username to email by default
        config.imap.username = email.to_string();
        config.smtp.username = email.to_string();

        config
    }

    /// Sets the same password for the store and the transport.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.imap.password.clone_from(&password);
        self.smtp.password = password;
        self
    }

    /// Parses configuration from JSON. Passwords are never serialized, so
    /// they must be supplied separately (see [`Self::password`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes configuration to pretty JSON without passwords.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-command timeout as a `Duration`.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod security_tests {
        use super::*;

        #[test]
        fn default_is_tls() {
            assert_eq!(Security::default(), Security::Tls);
        }

        #[test]
        fn display_names() {
            assert_eq!(Security::None.display_name(), "None (insecure)");
            assert_eq!(Security::Tls.display_name(), "SSL/TLS");
            assert_eq!(Security::StartTls.display_name(), "STARTTLS");
        }
    }

    mod port_tests {
        use super::*;

        #[test]
        fn imap_ports() {
            assert_eq!(ImapConfig::default_port(Security::Tls), 993);
            assert_eq!(ImapConfig::default_port(Security::StartTls), 143);
            assert_eq!(ImapConfig::default().port, 993);
        }

        #[test]
        fn smtp_ports() {
            assert_eq!(SmtpConfig::default_port(Security::StartTls), 587);
            assert_eq!(SmtpConfig::default_port(Security::Tls), 465);
            assert_eq!(SmtpConfig::default_port(Security::None), 25);
            assert_eq!(SmtpConfig::default().security, Security::StartTls);
        }
    }

    mod preset_tests {
        use super::*;

        #[test]
        fn gmail() {
            let config = GatewayConfig::with_email("user@gmail.com");
            assert_eq!(config.imap.host, "imap.gmail.com");
            assert_eq!(config.imap.port, 993);
            assert_eq!(config.smtp.host, "smtp.gmail.com");
            assert_eq!(config.smtp.port, 587);
            assert_eq!(config.smtp.security, Security::StartTls);
            assert_eq!(config.imap.username, "user@gmail.com");
            assert_eq!(config.folders.sent_candidates[0], "[Gmail]/Sent Mail");
        }

        #[test]
        fn outlook_sent_folder() {
            let config = GatewayConfig::with_email("user@Outlook.com");
            assert_eq!(config.smtp.host, "smtp.office365.com");
            assert_eq!(config.folders.sent_candidates[0], "Sent Items");
        }

        #[test]
        fn unknown_domain() {
            let config = GatewayConfig::with_email("ops@example.org");
            assert_eq!(config.imap.host, "imap.example.org");
            assert_eq!(config.smtp.host, "smtp.example.org");
        }
    }

    #[test]
    fn json_omits_passwords() {
        let config = GatewayConfig::with_email("user@gmail.com").password("secret");
        let json = config.to_json().unwrap();
        assert!(!json.contains("secret"));

        let parsed = GatewayConfig::from_json(&json).unwrap();
        assert_eq!(parsed.imap.host, "imap.gmail.com");
        assert!(parsed.imap.password.is_empty());
        assert_eq!(parsed.attachment_match, AttachmentMatch::ExactName);
    }

    #[test]
    fn json_fills_defaults() {
        let parsed = GatewayConfig::from_json(r#"{"address":"a@example.com"}"#).unwrap();
        assert_eq!(parsed.folders, FolderConfig::default());
        assert_eq!(parsed.io_timeout(), Duration::from_secs(60));
    }
}
