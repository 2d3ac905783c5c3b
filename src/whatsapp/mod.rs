//! WhatsApp client integration.
//!
//! Defines the seams to the protocol client (connector, transport,
//! credential store, pairing display) and a concrete client that talks to
//! a Baileys bridge sidecar over WebSocket.

mod bridge;
mod client;
mod credentials;
mod pairing;
mod types;

pub use bridge::{BridgeConnector, BridgeSession};
pub use client::{ClientError, Connector, Session, Transport};
pub use credentials::{CREDS_FILE, CredentialError, CredentialStore, FileCredentialStore};
pub use pairing::{PairingRenderer, TerminalQrRenderer, render_qr};
pub use types::{
    ClientEvent, ConnectionPhase, ConnectionUpdate, DisconnectReason, ExtendedText,
    LastDisconnect, MessageContent, MessageKey, MessagesUpsert, OutboundPayload, RawMessage,
    STATUS_BROADCAST_JID, UpsertKind,
};
