//! Seams between the bot and the WhatsApp protocol client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::{ClientEvent, MessageKey, OutboundPayload, RawMessage};

/// Errors that can occur while talking to the protocol client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection closed")]
    Closed,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request rejected by client: {0}")]
    Rejected(String),

    #[error("Media error: {0}")]
    Media(String),
}

/// Handle of a live session, used to act on the conversation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message to a conversation.
    async fn send_message(&self, jid: &str, payload: OutboundPayload) -> Result<(), ClientError>;

    /// Marks messages as read.
    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), ClientError>;

    /// Downloads the media attached to a message.
    async fn download_media(&self, message: &RawMessage) -> Result<Vec<u8>, ClientError>;

    /// Closes the session without logging out.
    async fn disconnect(&self);
}

/// A freshly established session: its handle and its ordered event stream.
pub type Session = (Arc<dyn Transport>, mpsc::Receiver<ClientEvent>);

/// Establishes sessions with the protocol client.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects, resuming from stored credentials when available.
    async fn connect(&self, credentials: Option<Value>) -> Result<Session, ClientError>;
}
