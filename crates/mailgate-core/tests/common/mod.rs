//! In-memory mail server for gateway tests.
//!
//! The store and transport sessions share one [`ServerState`] so tests can
//! seed folders, inject faults and inspect what the gateway did.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use mailgate_core::backend::{
    ComposedMessage, Connector, FetchProfile, FetchedMessage, MailTransport, SearchQuery, Session,
    StoreSession,
};
use mailgate_core::{Error, GatewayConfig, Result};
use mailgate_mime::Message;

/// Fault injected into the next command of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The server answers with an error; the session survives. A rejected
    /// submission surfaces as `Error::Send`.
    Protocol,
    /// The connection drops.
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub raw: Vec<u8>,
    pub seen: bool,
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub folders: BTreeMap<String, Vec<StoredMessage>>,
    /// Folder a submitted message is filed into, as providers do with sent mail.
    pub file_sent_into: Option<String>,
    pub selected: Option<String>,
    pub store_alive: bool,
    pub transport_alive: bool,
    pub refuse_connect: bool,
    pub fetch_fault: Option<Fault>,
    pub search_fault: Option<Fault>,
    pub send_fault: Option<Fault>,
    pub store_connects: usize,
    pub transport_connects: usize,
    pub opens: usize,
    pub closes: usize,
    pub logouts: usize,
    pub fetches: usize,
    pub sent: Vec<ComposedMessage>,
}

/// Handle shared between a test and the sessions it hands out.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    pub fn with_folder(self, name: &str) -> Self {
        self.state().folders.entry(name.to_string()).or_default();
        self
    }

    pub fn deliver(&self, folder: &str, raw: &str, seen: bool) {
        self.state()
            .folders
            .entry(folder.to_string())
            .or_default()
            .push(StoredMessage {
                raw: raw.as_bytes().to_vec(),
                seen,
            });
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }
}

pub struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    type Store = FakeStore;
    type Transport = FakeTransport;

    async fn connect_store(&self) -> Result<FakeStore> {
        let mut state = self.server.state();
        if state.refuse_connect {
            return Err(Error::Connection("authentication failed".to_string()));
        }
        state.store_connects += 1;
        state.store_alive = true;
        state.selected = None;
        Ok(FakeStore {
            server: self.server.clone(),
        })
    }

    async fn connect_transport(&self) -> Result<FakeTransport> {
        let mut state = self.server.state();
        if state.refuse_connect {
            return Err(Error::Connection("authentication failed".to_string()));
        }
        state.transport_connects += 1;
        state.transport_alive = true;
        Ok(FakeTransport {
            server: self.server.clone(),
        })
    }
}

pub struct FakeStore {
    server: FakeServer,
}

fn raise(state: &mut ServerState, fault: Fault, command: &str) -> Error {
    match fault {
        Fault::Protocol => Error::Protocol(format!("{command} failed")),
        Fault::Disconnect => {
            state.store_alive = false;
            Error::Connection(format!("connection lost during {command}"))
        }
    }
}

fn header_section(raw: &[u8]) -> Vec<u8> {
    raw.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map_or_else(|| raw.to_vec(), |end| raw[..end + 4].to_vec())
}

impl Session for FakeStore {
    async fn is_alive(&mut self) -> bool {
        self.server.state().store_alive
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.server.state();
        state.logouts += 1;
        state.store_alive = false;
        Ok(())
    }
}

impl StoreSession for FakeStore {
    async fn folder_exists(&mut self, name: &str) -> Result<bool> {
        Ok(self.server.state().folders.contains_key(name))
    }

    async fn examine(&mut self, name: &str) -> Result<u32> {
        let mut state = self.server.state();
        let Some(messages) = state.folders.get(name) else {
            return Err(Error::Protocol(format!("no such mailbox {name}")));
        };
        let exists = u32::try_from(messages.len()).unwrap();
        state.selected = Some(name.to_string());
        state.opens += 1;
        Ok(exists)
    }

    async fn close_folder(&mut self) -> Result<()> {
        let mut state = self.server.state();
        state.selected = None;
        state.closes += 1;
        Ok(())
    }

    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<u32>> {
        let mut state = self.server.state();
        if let Some(fault) = state.search_fault.take() {
            return Err(raise(&mut state, fault, "SEARCH"));
        }
        let folder = state.selected.clone().unwrap();
        let messages = &state.folders[&folder];

        let matches = |stored: &StoredMessage| {
            let message = Message::parse(&stored.raw);
            match query {
                SearchQuery::All => true,
                SearchQuery::MessageId(id) => message
                    .message_id()
                    .is_some_and(|value| value.to_lowercase().contains(&id.to_lowercase())),
                SearchQuery::Subject(text) => message
                    .subject()
                    .to_lowercase()
                    .contains(&text.to_lowercase()),
            }
        };

        Ok(messages
            .iter()
            .enumerate()
            .filter(|(_, stored)| matches(stored))
            .map(|(index, _)| u32::try_from(index + 1).unwrap())
            .collect())
    }

    async fn fetch(&mut self, seqs: &[u32], profile: FetchProfile) -> Result<Vec<FetchedMessage>> {
        let mut state = self.server.state();
        if let Some(fault) = state.fetch_fault.take() {
            return Err(raise(&mut state, fault, "FETCH"));
        }
        state.fetches += 1;
        let folder = state.selected.clone().unwrap();
        let messages = &state.folders[&folder];

        Ok(seqs
            .iter()
            .filter_map(|&seq| {
                let stored = messages.get(usize::try_from(seq).ok()?.checked_sub(1)?)?;
                let raw = match profile {
                    FetchProfile::Envelope => header_section(&stored.raw),
                    FetchProfile::Full => stored.raw.clone(),
                };
                Some(FetchedMessage {
                    seq,
                    seen: stored.seen,
                    raw,
                })
            })
            .collect())
    }
}

pub struct FakeTransport {
    server: FakeServer,
}

impl Session for FakeTransport {
    async fn is_alive(&mut self) -> bool {
        self.server.state().transport_alive
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.server.state();
        state.logouts += 1;
        state.transport_alive = false;
        Ok(())
    }
}

impl MailTransport for FakeTransport {
    async fn send(&mut self, message: &ComposedMessage) -> Result<()> {
        let mut state = self.server.state();
        match state.send_fault.take() {
            Some(Fault::Protocol) => {
                return Err(Error::Send("550 mailbox unavailable".to_string()));
            }
            Some(Fault::Disconnect) => {
                state.transport_alive = false;
                return Err(Error::Connection("connection reset during DATA".to_string()));
            }
            None => {}
        }
        if let Some(folder) = state.file_sent_into.clone() {
            state.folders.entry(folder).or_default().push(StoredMessage {
                raw: message.bytes.clone(),
                seen: true,
            });
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

pub fn config() -> GatewayConfig {
    let mut config = GatewayConfig::with_email("me@example.com").password("secret");
    config.display_name = Some("Me".to_string());
    config.folders.sent_candidates = vec!["[Gmail]/Sent Mail".to_string(), "Sent".to_string()];
    config
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
