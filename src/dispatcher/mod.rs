//! Inbound message dispatching.
//!
//! Turns each inbound message into reactions, keyword replies and
//! `!`-prefixed commands.

mod handler;
mod types;

pub use handler::{DispatchSummary, MessageDispatcher};
pub use types::{Action, AutoReply, BotCommand, InboundMessage};
