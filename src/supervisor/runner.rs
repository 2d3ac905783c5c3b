//! Session supervisor runner.
//!
//! The supervisor owns the session lifecycle:
//! 1. Load stored credentials and connect
//! 2. Consume the session's events one at a time:
//!    - connection updates drive the state machine (QR → render, open, close)
//!    - message batches go to the dispatcher with the current transport
//!    - credential updates go to the credential store before the next event
//! 3. On a recoverable close, wait for the retry policy and go back to 1
//! 4. On logout, stop; the operator has to pair again
//!
//! Events are handled strictly in order, so replies keep the order of the
//! messages they answer.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{ConnectionState, RetryPolicy};
use crate::dispatcher::MessageDispatcher;
use crate::whatsapp::{
    ClientEvent, ConnectionUpdate, Connector, CredentialError, CredentialStore, DisconnectReason,
    PairingRenderer, Transport,
};

/// Messages that can be sent to the supervisor.
#[derive(Debug, Clone)]
pub enum SupervisorMessage {
    /// Disconnect and stop.
    Shutdown,
}

/// Why the supervisor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The server logged the session out.
    LoggedOut(DisconnectReason),

    /// Shutdown was requested.
    Shutdown,

    /// The retry policy gave up.
    RetriesExhausted { attempts: u32 },
}

/// Errors that stop the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to load credentials: {0}")]
    Credentials(#[from] CredentialError),
}

/// How a single session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Reconnect,
    LoggedOut(DisconnectReason),
    Shutdown,
}

/// Keeps a session alive and feeds its events to the dispatcher.
pub struct SessionSupervisor {
    connector: Arc<dyn Connector>,

    dispatcher: Arc<MessageDispatcher>,

    credentials: Arc<dyn CredentialStore>,

    renderer: Arc<dyn PairingRenderer>,

    retry: RetryPolicy,

    state: ConnectionState,
}

impl SessionSupervisor {
    /// Creates a new supervisor.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        dispatcher: Arc<MessageDispatcher>,
        credentials: Arc<dyn CredentialStore>,
        renderer: Arc<dyn PairingRenderer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            connector,
            dispatcher,
            credentials,
            renderer,
            retry,
            state: ConnectionState::default(),
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs sessions until logout, shutdown, or the retry policy gives up.
    pub async fn run(
        &mut self,
        mut rx: mpsc::Receiver<SupervisorMessage>,
    ) -> Result<SupervisorExit, SupervisorError> {
        info!("Session supervisor started");

        // Reconnects since the last successful open.
        let mut attempt: u32 = 0;

        loop {
            self.state = ConnectionState::Connecting;
            let credentials = self.credentials.load().await?;
            debug!(
                "Connecting with {} credentials",
                if credentials.is_some() { "stored" } else { "no" }
            );

            let connected = tokio::select! {
                result = self.connector.connect(credentials) => result,
                msg = rx.recv() => match msg {
                    Some(SupervisorMessage::Shutdown) | None => {
                        info!("Supervisor shutting down");
                        return Ok(SupervisorExit::Shutdown);
                    }
                },
            };

            let end = match connected {
                Ok((transport, events)) => {
                    let end = self
                        .drive(transport.as_ref(), events, &mut rx, &mut attempt)
                        .await;
                    transport.disconnect().await;
                    end
                }
                Err(e) => {
                    warn!("Connection attempt failed: {}", e);
                    SessionEnd::Reconnect
                }
            };

            match end {
                SessionEnd::Shutdown => return Ok(SupervisorExit::Shutdown),
                SessionEnd::LoggedOut(reason) => {
                    error!("Session ended: {}. Pair again to continue.", reason);
                    return Ok(SupervisorExit::LoggedOut(reason));
                }
                SessionEnd::Reconnect => {
                    attempt += 1;
                    let Some(delay) = self.retry.delay_for(attempt) else {
                        error!("Giving up after {} reconnect attempts", attempt - 1);
                        return Ok(SupervisorExit::RetriesExhausted {
                            attempts: attempt - 1,
                        });
                    };

                    match self.retry.max_attempts() {
                        Some(max) => {
                            info!("Reconnecting in {:?} (attempt {}/{})", delay, attempt, max);
                        }
                        None => info!("Reconnecting in {:?} (attempt {})", delay, attempt),
                    }
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        msg = rx.recv() => match msg {
                            Some(SupervisorMessage::Shutdown) | None => {
                                info!("Supervisor shutting down");
                                return Ok(SupervisorExit::Shutdown);
                            }
                        },
                    }
                }
            }
        }
    }

    /// Consumes one session's events until it ends.
    async fn drive(
        &mut self,
        transport: &dyn Transport,
        mut events: mpsc::Receiver<ClientEvent>,
        control: &mut mpsc::Receiver<SupervisorMessage>,
        attempt: &mut u32,
    ) -> SessionEnd {
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                msg = control.recv() => match msg {
                    Some(SupervisorMessage::Shutdown) | None => {
                        info!("Supervisor shutting down");
                        return SessionEnd::Shutdown;
                    }
                },
            };

            let Some(event) = event else {
                warn!("Event stream ended without a close update");
                self.state = ConnectionState::ClosedRecoverable(DisconnectReason::CONNECTION_LOST);
                return SessionEnd::Reconnect;
            };

            match event {
                ClientEvent::ConnectionUpdate(update) => {
                    if let Some(end) = self.on_connection_update(&update, attempt) {
                        return end;
                    }
                }
                ClientEvent::MessagesUpsert(upsert) => {
                    let summary = self.dispatcher.handle_upsert(transport, &upsert).await;
                    debug!(
                        "Dispatched batch: {} messages, {} actions, {} failures",
                        summary.messages, summary.actions, summary.failures
                    );
                }
                ClientEvent::CredsUpdate(creds) => {
                    if let Err(e) = self.credentials.save(&creds).await {
                        error!("Failed to save credentials: {}", e);
                    }
                }
            }
        }
    }

    /// Applies a connection update; returns how the session ended, if it did.
    fn on_connection_update(
        &mut self,
        update: &ConnectionUpdate,
        attempt: &mut u32,
    ) -> Option<SessionEnd> {
        if let Some(qr) = update.qr.as_deref() {
            info!("Pairing code received");
            self.renderer.render(qr);
        }

        let next = self.state.apply(update);
        if next != self.state {
            info!("Connection state: {} -> {}", self.state, next);
            self.state = next;
        }

        match next {
            ConnectionState::Connecting => None,
            ConnectionState::Open => {
                *attempt = 0;
                None
            }
            ConnectionState::ClosedRecoverable(reason) => {
                warn!("Connection closed ({}), will reconnect", reason);
                Some(SessionEnd::Reconnect)
            }
            ConnectionState::ClosedTerminal(reason) => Some(SessionEnd::LoggedOut(reason)),
        }
    }
}

impl std::fmt::Debug for SessionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSupervisor")
            .field("state", &self.state)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
