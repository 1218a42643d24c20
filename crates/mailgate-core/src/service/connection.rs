//! Session lifecycle for the store and the transport.
//!
//! Each session lives in a slot behind an async mutex. An operation holds
//! the slot's [`Lease`] for the whole connect-and-use sequence, so liveness
//! checks, reconnects and commands on one session never interleave.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::backend::{Connector, Session};
use crate::{Error, Result};

/// Observable state of a session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session.
    Disconnected,
    /// A connect attempt is in flight (or was cancelled mid-way).
    Connecting,
    /// An authenticated session is available.
    Connected,
}

enum Slot<T> {
    Disconnected,
    Connecting,
    Connected(T),
}

impl<T> Slot<T> {
    const fn state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connecting => ConnectionState::Connecting,
            Self::Connected(_) => ConnectionState::Connected,
        }
    }
}

/// Exclusive use of a connected session for the duration of an operation.
pub struct Lease<'a, T> {
    guard: MutexGuard<'a, Slot<T>>,
}

impl<T> Lease<'_, T> {
    /// Returns the session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the session was invalidated earlier in
    /// this operation.
    pub fn session(&mut self) -> Result<&mut T> {
        match &mut *self.guard {
            Slot::Connected(session) => Ok(session),
            Slot::Disconnected | Slot::Connecting => Err(Error::Connection(
                "session was dropped after an earlier failure".to_string(),
            )),
        }
    }

    /// Drops the session so the next operation reconnects.
    pub fn invalidate(&mut self) {
        *self.guard = Slot::Disconnected;
    }

    /// Invalidates the session if `result` is a connection fault.
    pub fn settle<R>(&mut self, result: &Result<R>) {
        if let Err(error) = result {
            if error.is_connection_fault() {
                warn!(%error, "dropping session after connection fault");
                self.invalidate();
            }
        }
    }
}

/// Owns the read (store) and write (transport) sessions.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    store: Mutex<Slot<C::Store>>,
    transport: Mutex<Slot<C::Transport>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager with both sessions disconnected.
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            store: Mutex::new(Slot::Disconnected),
            transport: Mutex::new(Slot::Disconnected),
        }
    }

    /// Returns a live store session, connecting or reconnecting as needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if a fresh connect fails or times out.
    pub async fn ensure_read_connected(&self) -> Result<Lease<'_, C::Store>> {
        ensure(&self.store, "store", self.connect_timeout, || {
            self.connector.connect_store()
        })
        .await
    }

    /// Returns a live transport session, connecting or reconnecting as needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if a fresh connect fails or times out.
    pub async fn ensure_write_connected(&self) -> Result<Lease<'_, C::Transport>> {
        ensure(&self.transport, "transport", self.connect_timeout, || {
            self.connector.connect_transport()
        })
        .await
    }

    /// State of the store session.
    pub async fn read_state(&self) -> ConnectionState {
        self.store.lock().await.state()
    }

    /// State of the transport session.
    pub async fn write_state(&self) -> ConnectionState {
        self.transport.lock().await.state()
    }

    /// Closes both sessions. Errors are logged, never returned.
    pub async fn shutdown(&self) {
        teardown(&self.store, "store").await;
        teardown(&self.transport, "transport").await;
    }
}

async fn ensure<'a, T, F, Fut>(
    slot: &'a Mutex<Slot<T>>,
    kind: &'static str,
    limit: Duration,
    connect: F,
) -> Result<Lease<'a, T>>
where
    T: Session,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut guard = slot.lock().await;

    let alive = match &mut *guard {
        Slot::Connected(session) => session.is_alive().await,
        Slot::Disconnected | Slot::Connecting => false,
    };
    if alive {
        return Ok(Lease { guard });
    }

    if matches!(*guard, Slot::Connected(_)) {
        info!(kind, "session is stale, reconnecting");
    } else {
        debug!(kind, "connecting");
    }

    *guard = Slot::Connecting;
    match tokio::time::timeout(limit, connect()).await {
        Ok(Ok(session)) => {
            *guard = Slot::Connected(session);
            Ok(Lease { guard })
        }
        Ok(Err(error)) => {
            *guard = Slot::Disconnected;
            warn!(kind, %error, "connect failed");
            Err(match error {
                Error::Connection(_) => error,
                other => Error::Connection(other.to_string()),
            })
        }
        Err(_) => {
            *guard = Slot::Disconnected;
            warn!(kind, timeout_secs = limit.as_secs(), "connect timed out");
            Err(Error::Connection(format!(
                "{kind} connect timed out after {}s",
                limit.as_secs()
            )))
        }
    }
}

async fn teardown<T: Session>(slot: &Mutex<Slot<T>>, kind: &'static str) {
    let mut guard = slot.lock().await;
    if let Slot::Connected(mut session) = std::mem::replace(&mut *guard, Slot::Disconnected) {
        match session.disconnect().await {
            Ok(()) => debug!(kind, "session closed"),
            Err(error) => warn!(kind, %error, "error while closing session"),
        }
    }
}
