//! Channel-backed transport for tests and local simulations.
//!
//! Each successful [`Connector::connect`] produces a [`ServerEnd`] on the
//! receiver returned by [`InMemoryConnector::new`], through which a scripted
//! server reads what the client wrote and pushes frames or closes back.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};

use crate::transport::{Connector, FrameSink, FrameSource, Link, LinkEvent};

/// What the client wrote to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Close(u16),
}

#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    accepted: UnboundedSender<ServerEnd>,
    refusing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    pub fn new() -> (Self, UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        (
            Self {
                accepted,
                refusing: Arc::new(AtomicBool::new(false)),
                attempts: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// Make subsequent connection attempts fail.
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Number of connection attempts made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, target: &str) -> anyhow::Result<Link> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Connection refused: {}", target));
        }

        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let server = ServerEnd {
            target: target.to_string(),
            from_client: client_rx,
            to_client: server_tx.clone(),
            open: open.clone(),
        };
        self.accepted
            .send(server)
            .map_err(|_| anyhow::anyhow!("Connection refused: no server listening"))?;

        Ok((
            Box::new(InMemorySink {
                to_server: client_tx,
                to_self: server_tx.downgrade(),
                open: open.clone(),
            }),
            Box::new(InMemorySource {
                from_server: server_rx,
                open,
            }),
        ))
    }
}

struct InMemorySink {
    to_server: UnboundedSender<ClientFrame>,
    // A close from our side is reported back to our own source, as a real
    // socket would after the closing handshake. Weak so that dropping the
    // server end still ends the source.
    to_self: WeakUnboundedSender<LinkEvent>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for InMemorySink {
    async fn send(&mut self, text: String) -> anyhow::Result<()> {
        if !self.is_open() {
            return Err(anyhow::anyhow!("Connection closed"));
        }
        self.to_server
            .send(ClientFrame::Text(text))
            .map_err(|_| anyhow::anyhow!("Connection closed by peer"))
    }

    async fn close(&mut self, code: u16) -> anyhow::Result<()> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(to_self) = self.to_self.upgrade() {
            let _ = to_self.send(LinkEvent::Closed(Some(code)));
        }
        self.to_server
            .send(ClientFrame::Close(code))
            .map_err(|_| anyhow::anyhow!("Connection closed by peer"))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

struct InMemorySource {
    from_server: UnboundedReceiver<LinkEvent>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSource for InMemorySource {
    async fn recv(&mut self) -> LinkEvent {
        match self.from_server.recv().await {
            Some(event) => {
                if matches!(event, LinkEvent::Closed(_)) {
                    self.open.store(false, Ordering::SeqCst);
                }
                event
            }
            None => {
                self.open.store(false, Ordering::SeqCst);
                LinkEvent::Closed(None)
            }
        }
    }
}

/// The server side of one in-memory connection.
///
/// Dropping it without calling [`ServerEnd::close`] looks like an abnormal
/// disconnect to the client.
#[derive(Debug)]
pub struct ServerEnd {
    pub target: String,
    from_client: UnboundedReceiver<ClientFrame>,
    to_client: UnboundedSender<LinkEvent>,
    open: Arc<AtomicBool>,
}

impl ServerEnd {
    /// Next frame written by the client, `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    /// Next text frame, parsed as JSON. Close frames are skipped.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        loop {
            match self.recv().await? {
                ClientFrame::Text(text) => return serde_json::from_str(&text).ok(),
                ClientFrame::Close(_) => continue,
            }
        }
    }

    /// A frame the client has already written, without waiting.
    pub fn try_recv(&mut self) -> Option<ClientFrame> {
        self.from_client.try_recv().ok()
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(LinkEvent::Text(text.into()));
    }

    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_text(value.to_string());
    }

    /// Report a transport error to the client, as a socket would before it
    /// drops the connection.
    pub fn fail(&self, reason: &str) {
        let _ = self.to_client.send(LinkEvent::Error(reason.to_string()));
    }

    /// Close the connection with `code`.
    pub fn close(&self, code: u16) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.to_client.send(LinkEvent::Closed(Some(code)));
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
