//! # Transport Shell
//!
//! The async edge of the server: a TCP accept loop for viewers, the
//! tracking daemon's stdin stream, and the tick timer. Each source runs
//! in its own task and forwards [`Event`]s onto one channel; the engine
//! task consumes that channel alone, which is the whole concurrency
//! story.
//!
//! Connections speak newline-delimited JSON. TLS termination and
//! WebSocket upgrades belong to a fronting proxy.

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use phosphor_core::HeightField;

use crate::config::ServerConfig;
use crate::engine::{Event, GameEngine};
use crate::error::ServerError;

/// Outbound message channel for one viewer.
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// Handle for one viewer connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u32);

struct Peer {
    addr: String,
    sender: OutboundSender,
}

/// Live viewer connections and their outbound channels.
#[derive(Default)]
pub struct ConnectionTable {
    peers: HashMap<u32, Peer>,
}

impl ConnectionTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection.
    pub fn insert(&mut self, conn: ConnectionId, addr: String, sender: OutboundSender) {
        self.peers.insert(conn.0, Peer { addr, sender });
    }

    /// Drops a connection, returning its address if it was known.
    pub fn remove(&mut self, conn: ConnectionId) -> Option<String> {
        self.peers.remove(&conn.0).map(|peer| peer.addr)
    }

    /// The peer address behind a connection.
    #[must_use]
    pub fn addr(&self, conn: ConnectionId) -> Option<&str> {
        self.peers.get(&conn.0).map(|peer| peer.addr.as_str())
    }

    /// True if any live connection carries this address.
    #[must_use]
    pub fn is_addr_connected(&self, addr: &str) -> bool {
        self.peers.values().any(|peer| peer.addr == addr)
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True with no live connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Sends one message to one viewer. A closed peer is not an error;
    /// its disconnect event is already in flight.
    pub fn send_to(&self, conn: ConnectionId, text: &str) {
        if let Some(peer) = self.peers.get(&conn.0) {
            let _ = peer.sender.send(text.to_owned());
        }
    }

    /// Sends one message to every viewer.
    pub fn broadcast(&self, text: &str) {
        for peer in self.peers.values() {
            let _ = peer.sender.send(text.to_owned());
        }
    }
}

/// Binds the listener and runs the engine until the event channel dies.
///
/// # Errors
///
/// [`ServerError::Bind`] if the viewer listener cannot bind; nothing
/// after startup is fatal.
pub async fn run(
    config: ServerConfig,
    terrain: Box<dyn HeightField + Send>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&config.bind_address)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_address.clone(),
            source,
        })?;
    tracing::info!(addr = %config.bind_address, "viewer listener up");

    let (events, mut inbox) = mpsc::unbounded_channel::<Event>();
    tokio::spawn(accept_loop(listener, events.clone()));
    tokio::spawn(telemetry_loop(events.clone()));
    tokio::spawn(tick_loop(events.clone(), config.tick_interval()));
    drop(events);

    // The single logical thread: one task, one world.
    let mut engine = GameEngine::new(config, terrain);
    while let Some(event) = inbox.recv().await {
        engine.handle(event);
    }
    tracing::info!("event sources closed, shutting down");
    Ok(())
}

async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<Event>) {
    let mut next_conn = 0u32;
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                continue;
            }
        };
        let conn = ConnectionId(next_conn);
        next_conn = next_conn.wrapping_add(1);

        let (outbound, outbox) = mpsc::unbounded_channel::<String>();
        if events
            .send(Event::Connected {
                conn,
                addr: peer_addr.to_string(),
                sender: outbound,
            })
            .is_err()
        {
            return;
        }
        tokio::spawn(connection_loop(stream, conn, outbox, events.clone()));
    }
}

async fn connection_loop(
    stream: TcpStream,
    conn: ConnectionId,
    outbox: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<Event>,
) {
    let (reader, writer) = stream.into_split();
    tokio::spawn(writer_loop(writer, outbox));
    read_loop(reader, conn, &events).await;
    let _ = events.send(Event::Disconnected { conn });
}

async fn writer_loop(
    mut writer: tokio::net::tcp::OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = outbox.recv().await {
        if writer.write_all(text.as_bytes()).await.is_err()
            || writer.write_all(b"\n").await.is_err()
        {
            break;
        }
    }
}

async fn read_loop(reader: OwnedReadHalf, conn: ConnectionId, events: &mpsc::UnboundedSender<Event>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(text)) => {
                if events.send(Event::Message { conn, text }).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                tracing::debug!(conn = conn.0, %err, "viewer read error");
                return;
            }
        }
    }
}

async fn telemetry_loop(events: mpsc::UnboundedSender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if events.send(Event::Telemetry { line }).is_err() {
            return;
        }
    }
    tracing::info!("telemetry stream closed");
}

async fn tick_loop(events: mpsc::UnboundedSender<Event>, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if events.send(Event::Tick).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_table() {
        let mut table = ConnectionTable::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        table.insert(ConnectionId(0), "10.0.0.5:4120".into(), tx);

        assert_eq!(table.addr(ConnectionId(0)), Some("10.0.0.5:4120"));
        assert_eq!(table.len(), 1);
        assert!(table.is_addr_connected("10.0.0.5:4120"));
        assert!(!table.is_addr_connected("10.0.0.6:4120"));

        table.send_to(ConnectionId(0), "hello");
        assert_eq!(rx.try_recv().unwrap(), "hello");

        assert_eq!(table.remove(ConnectionId(0)).as_deref(), Some("10.0.0.5:4120"));
        assert!(table.is_empty());
        // Removing twice is quiet.
        assert!(table.remove(ConnectionId(0)).is_none());
    }

    #[test]
    fn test_broadcast_reaches_every_peer() {
        let mut table = ConnectionTable::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        table.insert(ConnectionId(0), "a".into(), tx_a);
        table.insert(ConnectionId(1), "b".into(), tx_b);

        table.broadcast("sync");
        assert_eq!(rx_a.try_recv().unwrap(), "sync");
        assert_eq!(rx_b.try_recv().unwrap(), "sync");
    }

    #[test]
    fn test_send_to_closed_peer_is_quiet() {
        let mut table = ConnectionTable::new();
        let (tx, rx) = mpsc::unbounded_channel();
        table.insert(ConnectionId(0), "a".into(), tx);
        drop(rx);
        table.send_to(ConnectionId(0), "into the void");
        table.broadcast("still quiet");
    }
}
