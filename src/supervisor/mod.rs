//! Session supervision.
//!
//! Keeps one WhatsApp session alive: connects with stored credentials,
//! reconnects after recoverable drops, and stops on logout.

mod retry;
mod runner;
mod state;

pub use retry::RetryPolicy;
pub use runner::{SessionSupervisor, SupervisorError, SupervisorExit, SupervisorMessage};
pub use state::ConnectionState;
