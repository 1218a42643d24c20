//! SMTP transport backed by `lettre`.

use std::time::Duration;

use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info, warn};

use super::{ComposedMessage, MailTransport, Session};
use crate::config::{Security, SmtpConfig};
use crate::{Error, Result};

/// Authenticated SMTP submission transport.
///
/// lettre pools its own connections; the health flag records whether the
/// last submission failed for a reason that a fresh transport may fix.
pub struct LettreTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    healthy: bool,
}

impl std::fmt::Debug for LettreTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LettreTransport")
            .field("healthy", &self.healthy)
            .finish_non_exhaustive()
    }
}

impl LettreTransport {
    /// Builds the transport and verifies that the server accepts a
    /// connection and the credentials.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the host is invalid, unreachable, or
    /// rejects the credentials.
    pub async fn connect(config: &SmtpConfig, io_timeout: Duration) -> Result<Self> {
        debug!(
            host = %config.host,
            port = config.port,
            security = config.security.display_name(),
            "connecting to SMTP server"
        );

        let builder = match config.security {
            Security::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host),
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host),
            Security::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &config.host,
            )),
        }
        .map_err(|e| Error::Connection(format!("invalid SMTP host {:?}: {e}", config.host)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(io_timeout))
            .build();

        let accepted = transport
            .test_connection()
            .await
            .map_err(|e| Error::Connection(format!("SMTP connect failed: {e}")))?;
        if !accepted {
            return Err(Error::Connection(
                "SMTP server rejected test connection".to_string(),
            ));
        }

        info!(host = %config.host, user = %config.username, "SMTP transport ready");
        Ok(Self {
            transport,
            healthy: true,
        })
    }
}

fn envelope_for(message: &ComposedMessage) -> Result<Envelope> {
    let parse = |email: &str| {
        email
            .parse::<lettre::Address>()
            .map_err(|e| Error::InvalidInput(format!("{email}: {e}")))
    };

    let sender = parse(&message.sender.email)?;
    let recipients = message
        .recipients
        .iter()
        .map(|address| parse(&address.email))
        .collect::<Result<Vec<_>>>()?;

    Envelope::new(Some(sender), recipients).map_err(|e| Error::InvalidInput(e.to_string()))
}

impl Session for LettreTransport {
    async fn is_alive(&mut self) -> bool {
        self.healthy
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.transport.shutdown().await;
        self.healthy = false;
        Ok(())
    }
}

impl MailTransport for LettreTransport {
    async fn send(&mut self, message: &ComposedMessage) -> Result<()> {
        let envelope = envelope_for(message)?;
        match self.transport.send_raw(&envelope, &message.bytes).await {
            Ok(_) => {
                debug!(
                    message_id = %message.message_id,
                    recipients = message.recipients.len(),
                    "message accepted by SMTP server"
                );
                Ok(())
            }
            Err(e) => {
                if !e.is_permanent() {
                    warn!(error = %e, "SMTP transport marked unhealthy");
                    self.healthy = false;
                }
                Err(Error::Send(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailgate_mime::Address;

    fn composed(recipients: &[&str]) -> ComposedMessage {
        ComposedMessage {
            sender: Address::new("me@example.com"),
            message_id: "<id@example.com>".to_string(),
            recipients: recipients.iter().map(|r| Address::new(*r)).collect(),
            bytes: b"Subject: x\r\n\r\nbody".to_vec(),
        }
    }

    #[test]
    fn envelope_uses_every_recipient() {
        let envelope = envelope_for(&composed(&["a@example.com", "b@example.com"])).unwrap();
        assert_eq!(envelope.to().len(), 2);
        assert_eq!(envelope.from().unwrap().to_string(), "me@example.com");
    }

    #[test]
    fn envelope_rejects_bad_address() {
        let result = envelope_for(&composed(&["not an address"]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn envelope_requires_recipients() {
        assert!(envelope_for(&composed(&[])).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_marks_transport_unhealthy() {
        // Reserve a port, then free it so connections are refused
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut transport = LettreTransport {
            transport: AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("127.0.0.1")
                .port(port)
                .timeout(Some(Duration::from_secs(2)))
                .build(),
            healthy: true,
        };
        assert!(transport.is_alive().await);

        let result = transport.send(&composed(&["a@example.com"])).await;
        assert!(matches!(result, Err(Error::Send(_))));
        assert!(!transport.is_alive().await);
    }
}
