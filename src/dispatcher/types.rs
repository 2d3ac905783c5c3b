//! Typed inbound messages, triggers and dispatch actions.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::whatsapp::{MessageKey, RawMessage, STATUS_BROADCAST_JID};

/// A validated view of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Key identifying the message, used for reactions and read receipts.
    pub key: MessageKey,

    /// Conversation the message arrived in.
    pub remote_id: String,

    /// Sent by this account.
    pub sender_is_self: bool,

    /// Posted to the status broadcast channel.
    pub is_status_broadcast: bool,

    /// Plain text, empty when the message has none.
    pub text: String,

    pub has_image_attachment: bool,

    /// Whether the message carried any content at all.
    pub has_payload: bool,

    pub sent_at: Option<DateTime<Utc>>,

    /// Display name of the sender.
    pub push_name: Option<String>,
}

impl InboundMessage {
    /// Builds the typed view from a raw message.
    ///
    /// Text comes from the conversational body, then from an extended text
    /// message, then from an image caption, and is empty otherwise.
    #[must_use]
    pub fn from_raw(raw: &RawMessage) -> Self {
        let remote_id = raw.key.remote_jid.clone().unwrap_or_default();
        let content = raw.message.as_ref();

        let text = content
            .and_then(|c| {
                c.conversation
                    .clone()
                    .or_else(|| {
                        c.extended_text_message
                            .as_ref()
                            .and_then(|ext| ext.text.clone())
                    })
                    .or_else(|| {
                        c.image_message
                            .as_ref()
                            .and_then(|img| img.get("caption"))
                            .and_then(|caption| caption.as_str())
                            .map(str::to_owned)
                    })
            })
            .unwrap_or_default();

        Self {
            key: raw.key.clone(),
            is_status_broadcast: remote_id == STATUS_BROADCAST_JID,
            remote_id,
            sender_is_self: raw.key.from_me,
            text,
            has_image_attachment: content.is_some_and(|c| c.image_message.is_some()),
            has_payload: content.is_some(),
            sent_at: raw
                .timestamp_secs()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            push_name: raw.push_name.clone(),
        }
    }

    /// Text trimmed and lowercased, the form every trigger is matched against.
    #[must_use]
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_lowercase()
    }
}

/// Commands from the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Send the welcome text.
    Start,

    /// Answer with "Pong!".
    Ping,

    /// List the available commands.
    Help,

    /// Describe the bot.
    Info,

    /// Send the attached image back as a sticker.
    Sticker,

    /// Send a random quote.
    Quote,
}

impl BotCommand {
    /// Every command, in help order.
    pub const ALL: [Self; 6] = [
        Self::Start,
        Self::Ping,
        Self::Help,
        Self::Info,
        Self::Sticker,
        Self::Quote,
    ];

    /// Parses normalized message text.
    ///
    /// Only an exact match of `<prefix><name>` is a command; arguments and
    /// prefixes of longer words are not.
    #[must_use]
    pub fn parse(normalized: &str, prefix: &str) -> Option<Self> {
        let name = normalized.strip_prefix(prefix)?;
        Self::ALL.into_iter().find(|cmd| cmd.name() == name)
    }

    /// Returns the command name as it appears after the prefix.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Ping => "ping",
            Self::Help => "help",
            Self::Info => "info",
            Self::Sticker => "sticker",
            Self::Quote => "quote",
        }
    }

    /// Returns the command description for help.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Start => "Show the welcome message",
            Self::Ping => "Check that the bot is alive",
            Self::Help => "Show this help message",
            Self::Info => "Show bot information",
            Self::Sticker => "Turn the attached image into a sticker",
            Self::Quote => "Get a random quote",
        }
    }

    /// Builds the help text for the given prefix.
    #[must_use]
    pub fn help_text(prefix: &str) -> String {
        let mut lines = vec!["📋 Available commands:".to_owned(), String::new()];
        for cmd in Self::ALL {
            lines.push(format!("{prefix}{} - {}", cmd.name(), cmd.description()));
        }
        lines.join("\n")
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Keyword auto-replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoReply {
    Hello,
    Hi,
}

impl AutoReply {
    /// Matches normalized message text exactly.
    #[must_use]
    pub fn parse(normalized: &str) -> Option<Self> {
        match normalized {
            "hello" => Some(Self::Hello),
            "hi" => Some(Self::Hi),
            _ => None,
        }
    }
}

/// One step the dispatcher takes for a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Mark the message as read.
    MarkRead(MessageKey),

    /// React to the message with an emoji.
    React {
        jid: String,
        key: MessageKey,
        emoji: String,
    },

    /// Send a text message.
    SendText { jid: String, text: String },

    /// Download the message's image and send it back as a sticker.
    EchoSticker { jid: String },
}

impl Action {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MarkRead(_) => "mark_read",
            Self::React { .. } => "react",
            Self::SendText { .. } => "send_text",
            Self::EchoSticker { .. } => "echo_sticker",
        }
    }
}
