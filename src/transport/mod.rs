//! Connection seams between a driver and the game server.
//!
//! A [`Connector`] opens one connection and hands back its two halves: a
//! [`FrameSink`] the driver writes through and a [`FrameSource`] a reader task
//! drains into the driver's event queue.

use async_trait::async_trait;

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text frame from the server.
    Text(String),
    /// The connection is gone. `None` when no close code was received.
    Closed(Option<u16>),
    /// A transport-level failure. A `Closed` event always follows.
    Error(String),
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, text: String) -> anyhow::Result<()>;
    async fn close(&mut self, code: u16) -> anyhow::Result<()>;
    fn is_open(&self) -> bool;
}

#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next event. After `Closed` the source is exhausted.
    async fn recv(&mut self) -> LinkEvent;
}

pub type Link = (Box<dyn FrameSink>, Box<dyn FrameSource>);

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &str) -> anyhow::Result<Link>;
}

pub mod in_memory;
pub mod ws;
