//! Message dispatcher implementation.
//!
//! Every message goes through two steps:
//! 1. `plan`: a pure decision turning the typed message into actions
//! 2. `execute`: the actions are performed in order on the transport
//!
//! Planning rules, in priority order:
//! - self-sent messages are ignored
//! - status broadcasts are marked read and nothing else
//! - history syncs and messages without content are ignored
//! - anything not starting with the command prefix gets a reaction
//! - "hello" / "hi" get a greeting (on top of the reaction)
//! - exact command matches run their command

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::types::{Action, AutoReply, BotCommand, InboundMessage};
use crate::config::{BotSettings, ReplyConfig};
use crate::whatsapp::{
    ClientError, MessagesUpsert, OutboundPayload, RawMessage, Transport, UpsertKind,
};

/// Outcome of one `messages.upsert` batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Messages in the batch.
    pub messages: usize,

    /// Actions completed.
    pub actions: usize,

    /// Messages whose actions stopped on an error.
    pub failures: usize,
}

/// Routes inbound messages to reactions, replies and commands.
pub struct MessageDispatcher {
    /// Command prefix (e.g., "!"), lowercased.
    prefix: String,

    replies: ReplyConfig,

    /// Reply to `!sticker` without an image instead of ignoring it.
    sticker_hint: bool,

    /// Source for `!quote` selection.
    rng: Mutex<StdRng>,
}

impl MessageDispatcher {
    /// Creates a new dispatcher.
    #[must_use]
    pub fn new(prefix: &str, replies: ReplyConfig, sticker_hint: bool) -> Self {
        Self {
            prefix: prefix.to_lowercase(),
            replies,
            sticker_hint,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Creates a dispatcher from bot settings.
    #[must_use]
    pub fn from_settings(settings: &BotSettings, replies: ReplyConfig) -> Self {
        Self::new(&settings.command_prefix, replies, settings.sticker_hint)
    }

    /// Makes quote selection deterministic.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Handles every message of a batch, in order.
    ///
    /// Failures are logged and counted; they never escape to the caller.
    pub async fn handle_upsert(
        &self,
        transport: &dyn Transport,
        upsert: &MessagesUpsert,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for raw in &upsert.messages {
            summary.messages += 1;

            let message = InboundMessage::from_raw(raw);
            if message.has_payload && !message.sender_is_self && !message.is_status_broadcast {
                info!(
                    "Message from {} ({}) {}: \"{}\"",
                    message.push_name.as_deref().unwrap_or("unknown"),
                    message.remote_id,
                    sent_at_for_log(message.sent_at),
                    truncate_for_log(&message.text, 80)
                );
            }

            let actions = self.plan(upsert.kind, &message);
            for action in &actions {
                match self.execute(transport, raw, action).await {
                    Ok(()) => {
                        debug!("Action {} done for {}", action.kind(), message.remote_id);
                        summary.actions += 1;
                    }
                    Err(e) => {
                        warn!(
                            "Action {} failed for {}: {}",
                            action.kind(),
                            message.remote_id,
                            e
                        );
                        summary.failures += 1;
                        break;
                    }
                }
            }
        }

        summary
    }

    /// Decides what to do with a message, without side effects.
    pub fn plan(&self, kind: UpsertKind, message: &InboundMessage) -> Vec<Action> {
        if message.sender_is_self || message.remote_id.is_empty() {
            return Vec::new();
        }

        if message.is_status_broadcast {
            return vec![Action::MarkRead(message.key.clone())];
        }

        if !message.has_payload || kind != UpsertKind::Notify {
            return Vec::new();
        }

        let text = message.normalized_text();
        let jid = &message.remote_id;
        let mut actions = Vec::new();

        // Reacting does not exclude a greeting: "hi" gets both.
        if !text.starts_with(&self.prefix) {
            actions.push(Action::React {
                jid: jid.clone(),
                key: message.key.clone(),
                emoji: self.replies.reaction.clone(),
            });
        }

        if let Some(reply) = AutoReply::parse(&text) {
            let greeting = match reply {
                AutoReply::Hello => &self.replies.greeting_hello,
                AutoReply::Hi => &self.replies.greeting_hi,
            };
            actions.push(send_text(jid, greeting.clone()));
        }

        if let Some(command) = BotCommand::parse(&text, &self.prefix) {
            debug!("Handling command: {}", command);
            self.plan_command(command, message, &mut actions);
        }

        actions
    }

    fn plan_command(
        &self,
        command: BotCommand,
        message: &InboundMessage,
        actions: &mut Vec<Action>,
    ) {
        let jid = &message.remote_id;

        let text = match command {
            BotCommand::Start => self.replies.welcome.clone(),
            BotCommand::Ping => self.replies.pong.clone(),
            BotCommand::Help => BotCommand::help_text(&self.prefix),
            BotCommand::Info => self.replies.info_text(),
            BotCommand::Sticker if message.has_image_attachment => {
                actions.push(Action::EchoSticker { jid: jid.clone() });
                return;
            }
            BotCommand::Sticker if self.sticker_hint => self.replies.sticker_hint.clone(),
            BotCommand::Sticker => {
                debug!("Ignoring sticker command without an image from {}", jid);
                return;
            }
            BotCommand::Quote => {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                let Some(quote) = self.replies.quotes.pick(&mut *rng) else {
                    warn!("Quote requested but no quotes are configured");
                    return;
                };
                quote.to_owned()
            }
        };

        actions.push(send_text(jid, text));
    }

    /// Performs one action.
    #[allow(clippy::unused_self)]
    async fn execute(
        &self,
        transport: &dyn Transport,
        raw: &RawMessage,
        action: &Action,
    ) -> Result<(), ClientError> {
        match action {
            Action::MarkRead(key) => transport.read_messages(std::slice::from_ref(key)).await,
            Action::React { jid, key, emoji } => {
                transport
                    .send_message(
                        jid,
                        OutboundPayload::Reaction {
                            emoji: emoji.clone(),
                            key: key.clone(),
                        },
                    )
                    .await
            }
            Action::SendText { jid, text } => {
                transport
                    .send_message(jid, OutboundPayload::Text { text: text.clone() })
                    .await
            }
            Action::EchoSticker { jid } => {
                let data = transport.download_media(raw).await?;
                debug!("Downloaded {} bytes for sticker", data.len());
                transport
                    .send_message(jid, OutboundPayload::Sticker { data })
                    .await
            }
        }
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("prefix", &self.prefix)
            .field("sticker_hint", &self.sticker_hint)
            .finish_non_exhaustive()
    }
}

fn send_text(jid: &str, text: String) -> Action {
    Action::SendText {
        jid: jid.to_owned(),
        text,
    }
}

/// Formats the send time of a message for logging.
fn sent_at_for_log(sent_at: Option<DateTime<Utc>>) -> String {
    sent_at.map_or_else(
        || "at unknown time".to_owned(),
        |at| format!("at {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
    )
}

/// Truncates a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
