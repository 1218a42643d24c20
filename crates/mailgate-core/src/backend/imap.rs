//! IMAP store backed by `async-imap` over tokio/rustls.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_imap::types::Flag;
use futures::TryStreamExt;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

use super::{FetchProfile, FetchedMessage, SearchQuery, Session, StoreSession};
use crate::config::{ImapConfig, Security};
use crate::{Error, Result};

const STARTTLS_TAG: &str = "m0";
const MAX_GREETING_LINE: usize = 8 * 1024;

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Opens a stream according to the configured security mode.
    ///
    /// For STARTTLS the server greeting and the upgrade exchange are
    /// consumed here; the IMAP client starts on the encrypted stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the TCP connect, STARTTLS exchange or
    /// TLS handshake fails.
    pub async fn open(config: &ImapConfig) -> Result<Self> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|e| connection_error("TCP connect", &e))?;

        match config.security {
            Security::None => Ok(Self::Plain(tcp)),
            Security::Tls => upgrade(tcp, &config.host).await,
            Security::StartTls => {
                let tcp = negotiate_starttls(tcp).await?;
                upgrade(tcp, &config.host).await
            }
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with the ring provider and webpki roots.
fn create_tls_connector() -> Result<TlsConnector> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Connection(format!("TLS configuration: {e}")))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

async fn upgrade(tcp: TcpStream, host: &str) -> Result<ImapStream> {
    let connector = create_tls_connector()?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Connection(format!("invalid server name {host:?}: {e}")))?;
    let tls = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| connection_error("TLS handshake", &e))?;
    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Reads the greeting and issues `STARTTLS` on a plaintext connection.
async fn negotiate_starttls(mut tcp: TcpStream) -> Result<TcpStream> {
    let greeting = read_line(&mut tcp).await?;
    debug!(greeting = %greeting.trim_end(), "IMAP greeting");

    tcp.write_all(format!("{STARTTLS_TAG} STARTTLS\r\n").as_bytes())
        .await
        .map_err(|e| connection_error("STARTTLS", &e))?;

    loop {
        let line = read_line(&mut tcp).await?;
        let Some(status) = line.strip_prefix(STARTTLS_TAG).map(str::trim_start) else {
            continue;
        };
        if status.get(..2).is_some_and(|s| s.eq_ignore_ascii_case("OK")) {
            return Ok(tcp);
        }
        return Err(Error::Connection(format!(
            "server refused STARTTLS: {}",
            status.trim_end()
        )));
    }
}

async fn read_line(tcp: &mut TcpStream) -> Result<String> {
    let mut line = Vec::new();
    loop {
        let byte = tcp
            .read_u8()
            .await
            .map_err(|e| connection_error("reading server response", &e))?;
        line.push(byte);
        if byte == b'\n' {
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        if line.len() > MAX_GREETING_LINE {
            return Err(Error::Protocol("server response line too long".to_string()));
        }
    }
}

fn connection_error(context: &str, error: &io::Error) -> Error {
    Error::Connection(format!("{context}: {error}"))
}

/// Maps `async-imap` errors: transport faults are connection errors, server
/// refusals are protocol errors.
fn imap_error(context: &str, error: async_imap::error::Error) -> Error {
    use async_imap::error::Error as ImapError;

    match error {
        ImapError::Io(e) => connection_error(context, &e),
        ImapError::ConnectionLost => Error::Connection(format!("{context}: connection lost")),
        other => Error::Protocol(format!("{context}: {other}")),
    }
}

async fn with_timeout<T>(
    limit: Duration,
    context: &str,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| Error::Timeout(format!("{context} exceeded {}s", limit.as_secs())))?
}

/// Authenticated IMAP session.
pub struct ImapStore {
    session: async_imap::Session<ImapStream>,
    io_timeout: Duration,
}

impl std::fmt::Debug for ImapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStore")
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl ImapStore {
    /// Connects and logs in.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the server is unreachable or rejects
    /// the credentials.
    pub async fn connect(config: &ImapConfig, io_timeout: Duration) -> Result<Self> {
        debug!(
            host = %config.host,
            port = config.port,
            security = config.security.display_name(),
            "connecting to IMAP server"
        );

        let stream = with_timeout(io_timeout, "IMAP connect", ImapStream::open(config)).await?;
        let tls = stream.is_tls();
        let client = async_imap::Client::new(stream);
        let session = with_timeout(io_timeout, "IMAP login", async {
            client
                .login(&config.username, &config.password)
                .await
                .map_err(|(e, _)| Error::Connection(format!("IMAP login failed: {e}")))
        })
        .await?;

        info!(host = %config.host, user = %config.username, tls, "IMAP session established");
        Ok(Self {
            session,
            io_timeout,
        })
    }
}

impl Session for ImapStore {
    async fn is_alive(&mut self) -> bool {
        let limit = self.io_timeout;
        with_timeout(limit, "NOOP", async {
            self.session.noop().await.map_err(|e| imap_error("NOOP", e))
        })
        .await
        .is_ok()
    }

    async fn disconnect(&mut self) -> Result<()> {
        let limit = self.io_timeout;
        with_timeout(limit, "LOGOUT", async {
            self.session.logout().await.map_err(|e| imap_error("LOGOUT", e))
        })
        .await
    }
}

impl StoreSession for ImapStore {
    async fn folder_exists(&mut self, name: &str) -> Result<bool> {
        let limit = self.io_timeout;
        let pattern = quote(name);
        with_timeout(limit, "LIST", async {
            let names: Vec<_> = self
                .session
                .list(None, Some(pattern.as_str()))
                .await
                .map_err(|e| imap_error("LIST", e))?
                .try_collect()
                .await
                .map_err(|e| imap_error("LIST", e))?;
            Ok(names.iter().any(|n| n.name() == name))
        })
        .await
    }

    async fn examine(&mut self, name: &str) -> Result<u32> {
        let limit = self.io_timeout;
        let mailbox = with_timeout(limit, "EXAMINE", async {
            self.session
                .examine(name)
                .await
                .map_err(|e| imap_error("EXAMINE", e))
        })
        .await?;
        Ok(mailbox.exists)
    }

    async fn close_folder(&mut self) -> Result<()> {
        let limit = self.io_timeout;
        with_timeout(limit, "CLOSE", async {
            self.session.close().await.map_err(|e| imap_error("CLOSE", e))
        })
        .await
    }

    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<u32>> {
        let limit = self.io_timeout;
        let criteria = search_criteria(query)?;
        let found = with_timeout(limit, "SEARCH", async {
            self.session
                .search(&criteria)
                .await
                .map_err(|e| imap_error("SEARCH", e))
        })
        .await?;

        let mut seqs: Vec<u32> = found.into_iter().collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    async fn fetch(&mut self, seqs: &[u32], profile: FetchProfile) -> Result<Vec<FetchedMessage>> {
        if seqs.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.io_timeout;
        let set = sequence_set(seqs);
        let items = match profile {
            FetchProfile::Envelope => "(FLAGS BODY.PEEK[HEADER])",
            FetchProfile::Full => "(FLAGS BODY.PEEK[])",
        };

        let fetches: Vec<_> = with_timeout(limit, "FETCH", async {
            self.session
                .fetch(&set, items)
                .await
                .map_err(|e| imap_error("FETCH", e))?
                .try_collect()
                .await
                .map_err(|e| imap_error("FETCH", e))
        })
        .await?;

        let mut messages: Vec<FetchedMessage> = fetches
            .iter()
            .map(|fetch| {
                let raw = match profile {
                    FetchProfile::Envelope => fetch.header(),
                    FetchProfile::Full => fetch.body(),
                };
                FetchedMessage {
                    seq: fetch.message,
                    seen: fetch.flags().any(|flag| matches!(flag, Flag::Seen)),
                    raw: raw.unwrap_or_default().to_vec(),
                }
            })
            .collect();
        messages.sort_by_key(|m| m.seq);
        debug!(requested = seqs.len(), received = messages.len(), "fetched messages");
        Ok(messages)
    }
}

/// Quotes a string for use as an IMAP quoted string.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Quotes search text. Quoted strings carry 7-bit text only and no line
/// breaks, so anything else is refused rather than sent.
fn quote_search_text(value: &str) -> Result<String> {
    if let Some(c) = value
        .chars()
        .find(|c| !c.is_ascii() || matches!(c, '\r' | '\n' | '\0'))
    {
        return Err(Error::InvalidInput(format!(
            "search text contains {c:?}, which cannot be sent in an IMAP quoted string"
        )));
    }
    Ok(quote(value))
}

fn search_criteria(query: &SearchQuery) -> Result<String> {
    Ok(match query {
        SearchQuery::All => "ALL".to_string(),
        SearchQuery::MessageId(id) => format!("HEADER Message-ID {}", quote_search_text(id)?),
        SearchQuery::Subject(text) => format!("SUBJECT {}", quote_search_text(text)?),
    })
}

/// Formats sequence numbers as a compact IMAP sequence set (`1,3,5:7`).
fn sequence_set(seqs: &[u32]) -> String {
    let mut sorted = seqs.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for seq in sorted {
        match ranges.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(seq) => *end = seq,
            _ => ranges.push((seq, seq)),
        }
    }

    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}:{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sequence_set_compresses_runs() {
        assert_eq!(sequence_set(&[1]), "1");
        assert_eq!(sequence_set(&[7, 5, 6, 1, 3, 3]), "1,3,5:7");
        assert_eq!(sequence_set(&[1, 2, 3, 4]), "1:4");
    }

    #[test]
    fn quoting_escapes_specials() {
        assert_eq!(quote("[Gmail]/Sent Mail"), "\"[Gmail]/Sent Mail\"");
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn search_criteria_forms() {
        assert_eq!(search_criteria(&SearchQuery::All).unwrap(), "ALL");
        assert_eq!(
            search_criteria(&SearchQuery::MessageId("abc@example.com".into())).unwrap(),
            "HEADER Message-ID \"abc@example.com\""
        );
        assert_eq!(
            search_criteria(&SearchQuery::Subject("say \"hi\"".into())).unwrap(),
            "SUBJECT \"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn search_text_cannot_break_the_command_line() {
        for query in [
            SearchQuery::Subject("a\r\nA9 LOGOUT".into()),
            SearchQuery::MessageId("x@y\r\nA9 DELETE Important".into()),
            SearchQuery::Subject("nul\0byte".into()),
            SearchQuery::Subject("lone\nfeed".into()),
        ] {
            assert!(
                matches!(search_criteria(&query), Err(Error::InvalidInput(_))),
                "{query:?} was accepted"
            );
        }
    }

    #[test]
    fn search_text_must_be_seven_bit() {
        let result = search_criteria(&SearchQuery::Subject("Résumé".into()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn tls_connector_builds() {
        assert!(create_tls_connector().is_ok());
    }
}
