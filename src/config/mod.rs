//! Configuration module for the auto-reply bot.
//!
//! Handles loading and validation of the bridge connection settings,
//! bot behaviour switches and the canned reply texts.

mod replies;
mod settings;

pub use replies::{MAX_REACTION_CHARS, QuoteBank, ReplyConfig, ValidationError};
pub use settings::{BotSettings, BridgeConfig, ConfigError};
