//! Connection state machine.

use std::fmt;

use crate::whatsapp::{ConnectionPhase, ConnectionUpdate, DisconnectReason};

/// State of the current session, driven by `connection.update` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Connecting or waiting for pairing.
    #[default]
    Connecting,

    /// Ready to exchange messages.
    Open,

    /// Dropped for a reason worth reconnecting over.
    ClosedRecoverable(DisconnectReason),

    /// Logged out by the server; needs re-pairing.
    ClosedTerminal(DisconnectReason),
}

impl ConnectionState {
    /// Returns the state after applying an update.
    ///
    /// Updates without a connection phase (QR-only updates) keep the state.
    /// A close without a reason is treated as a lost connection.
    #[must_use]
    pub fn apply(self, update: &ConnectionUpdate) -> Self {
        match update.connection {
            None => self,
            Some(ConnectionPhase::Connecting) => Self::Connecting,
            Some(ConnectionPhase::Open) => Self::Open,
            Some(ConnectionPhase::Close) => {
                let reason = update
                    .disconnect_reason()
                    .unwrap_or(DisconnectReason::CONNECTION_LOST);
                if reason.is_logged_out() {
                    Self::ClosedTerminal(reason)
                } else {
                    Self::ClosedRecoverable(reason)
                }
            }
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::ClosedRecoverable(reason) => write!(f, "closed: {reason}"),
            Self::ClosedTerminal(reason) => write!(f, "closed for good: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(phase: ConnectionPhase) -> ConnectionUpdate {
        ConnectionUpdate {
            connection: Some(phase),
            ..ConnectionUpdate::default()
        }
    }

    #[test]
    fn test_default_is_connecting() {
        assert_eq!(ConnectionState::default(), ConnectionState::Connecting);
    }

    #[test]
    fn test_open_and_connecting() {
        let state = ConnectionState::Connecting.apply(&phase(ConnectionPhase::Open));
        assert_eq!(state, ConnectionState::Open);
        let state = state.apply(&phase(ConnectionPhase::Connecting));
        assert_eq!(state, ConnectionState::Connecting);
    }

    #[test]
    fn test_qr_update_keeps_state() {
        let update = ConnectionUpdate {
            qr: Some("2@payload".to_owned()),
            ..ConnectionUpdate::default()
        };
        assert_eq!(
            ConnectionState::Connecting.apply(&update),
            ConnectionState::Connecting
        );
    }

    #[test]
    fn test_logged_out_is_terminal() {
        let update = ConnectionUpdate::closed(DisconnectReason::LOGGED_OUT, "logged out");
        assert_eq!(
            ConnectionState::Open.apply(&update),
            ConnectionState::ClosedTerminal(DisconnectReason::LOGGED_OUT)
        );
    }

    #[test]
    fn test_other_close_reasons_are_recoverable() {
        for reason in [
            DisconnectReason::CONNECTION_CLOSED,
            DisconnectReason::CONNECTION_LOST,
            DisconnectReason::RESTART_REQUIRED,
            DisconnectReason::BAD_SESSION,
            DisconnectReason(999),
        ] {
            let state = ConnectionState::Open.apply(&ConnectionUpdate::closed(reason, "drop"));
            assert_eq!(state, ConnectionState::ClosedRecoverable(reason));
        }
    }

    #[test]
    fn test_close_without_reason() {
        let state = ConnectionState::Open.apply(&phase(ConnectionPhase::Close));
        assert_eq!(
            state,
            ConnectionState::ClosedRecoverable(DisconnectReason::CONNECTION_LOST)
        );
    }
}
