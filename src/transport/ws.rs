//! WebSocket transport built on `tokio-tungstenite`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

use crate::transport::{Connector, FrameSink, FrameSource, Link, LinkEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default timeout for opening a connection (30 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum message size (10 MB) to prevent excessive memory allocation.
const MAX_MESSAGE_SIZE: usize = 10_000_000;

/// Opens `ws://` / `wss://` connections to the game server.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
    max_message_size: usize,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, target: &str) -> anyhow::Result<Link> {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_message_size);

        let (stream, response) = timeout(
            self.connect_timeout,
            connect_async_with_config(target, Some(config), true),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Connect timeout after {:?}", self.connect_timeout))?
        .map_err(|e| anyhow::anyhow!("Connect error: {}", e))?;
        debug!("connected to {} (HTTP {})", target, response.status());

        let open = Arc::new(AtomicBool::new(true));
        let (sink, source) = stream.split();
        Ok((
            Box::new(WsSink {
                sink,
                open: open.clone(),
            }),
            Box::new(WsSource {
                stream: source,
                open,
                failed: false,
            }),
        ))
    }
}

pub struct WsSink {
    sink: SplitSink<WsStream, Message>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> anyhow::Result<()> {
        if !self.is_open() {
            return Err(anyhow::anyhow!("Connection closed"));
        }
        self.sink.send(Message::Text(text)).await.map_err(|e| {
            self.open.store(false, Ordering::SeqCst);
            anyhow::anyhow!("Write error: {}", e)
        })
    }

    async fn close(&mut self, code: u16) -> anyhow::Result<()> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| anyhow::anyhow!("Close error: {}", e))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

pub struct WsSource {
    stream: SplitStream<WsStream>,
    open: Arc<AtomicBool>,
    failed: bool,
}

impl WsSource {
    fn closed(&mut self, code: Option<u16>) -> LinkEvent {
        self.open.store(false, Ordering::SeqCst);
        LinkEvent::Closed(code)
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> LinkEvent {
        if self.failed {
            return self.closed(None);
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return LinkEvent::Text(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return match String::from_utf8(bytes) {
                        Ok(text) => LinkEvent::Text(text),
                        Err(e) => LinkEvent::Error(format!("Binary frame is not UTF-8: {}", e)),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return self.closed(frame.map(|f| u16::from(f.code)));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.failed = true;
                    return LinkEvent::Error(format!("Read error: {}", e));
                }
                None => return self.closed(None),
            }
        }
    }
}
