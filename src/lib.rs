//! WhatsApp Auto-Reply Bot Library
//!
//! A WhatsApp bot that answers greetings and `!` commands on a linked
//! account.
//!
//! This crate provides the core functionality for:
//! - Loading and validating reply texts
//! - Talking to WhatsApp through a Baileys bridge over WebSocket
//! - Keeping the session alive across drops
//! - Turning inbound messages into reactions, replies and commands

pub mod config;
pub mod dispatcher;
pub mod supervisor;
pub mod whatsapp;
