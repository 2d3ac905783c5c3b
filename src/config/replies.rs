//! Canned reply texts and the quote bank.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating reply texts.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Reply text '{field}' is empty")]
    EmptyText { field: &'static str },

    #[error("Quote at index {index} is empty")]
    EmptyQuote { index: usize },

    #[error("No quotes configured")]
    NoQuotes,

    #[error("Reaction emoji is too long: {length} chars (max: {max_length})")]
    ReactionTooLong { length: usize, max_length: usize },

    #[error("Failed to read replies file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse replies file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Longest reaction accepted, in chars (emoji with modifiers and joiners).
pub const MAX_REACTION_CHARS: usize = 8;

/// Fixed, ordered list of quotes served by `!quote`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct QuoteBank(Vec<String>);

impl QuoteBank {
    /// Creates a quote bank from the given quotes.
    #[must_use]
    pub fn new(quotes: Vec<String>) -> Self {
        Self(quotes)
    }

    /// Picks one quote uniformly at random.
    ///
    /// Returns `None` only when the bank is empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        if self.0.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.0.len());
        self.0.get(index).map(String::as_str)
    }

    /// Returns all quotes in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of quotes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the bank holds no quotes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for QuoteBank {
    fn default() -> Self {
        Self(vec![
            "The best way to get started is to quit talking and begin doing. - Walt Disney"
                .to_owned(),
            "Don't let yesterday take up too much of today. - Will Rogers".to_owned(),
            "It's not whether you get knocked down, it's whether you get up. - Vince Lombardi"
                .to_owned(),
            "Whether you think you can or you think you can't, you're right. - Henry Ford"
                .to_owned(),
        ])
    }
}

/// All texts the bot answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Reply to `!start`.
    #[serde(default = "default_welcome")]
    pub welcome: String,

    /// Reply to `!info`. `{version}` is replaced with the crate version.
    #[serde(default = "default_info")]
    pub info: String,

    /// Auto-reply to "hello".
    #[serde(default = "default_greeting_hello")]
    pub greeting_hello: String,

    /// Auto-reply to "hi".
    #[serde(default = "default_greeting_hi")]
    pub greeting_hi: String,

    /// Reply to `!ping`.
    #[serde(default = "default_pong")]
    pub pong: String,

    /// Emoji attached to every plain (non-command) message.
    #[serde(default = "default_reaction")]
    pub reaction: String,

    /// Sent for `!sticker` without an image, when hints are enabled.
    #[serde(default = "default_sticker_hint")]
    pub sticker_hint: String,

    /// Quotes served by `!quote`.
    #[serde(default)]
    pub quotes: QuoteBank,
}

fn default_welcome() -> String {
    "👋 Welcome! I'm an auto-reply bot. Send !help to see what I can do.".to_owned()
}

fn default_info() -> String {
    "🤖 Auto Reply Bot v{version}\n\
     Replies to greetings, reacts to your messages, turns images into stickers \
     and shares quotes."
        .to_owned()
}

fn default_greeting_hello() -> String {
    "Hi there! 👋 How can I help you today?".to_owned()
}

fn default_greeting_hi() -> String {
    "Hello!".to_owned()
}

fn default_pong() -> String {
    "Pong!".to_owned()
}

fn default_reaction() -> String {
    "❤️".to_owned()
}

fn default_sticker_hint() -> String {
    "Send !sticker as the caption of an image to get it back as a sticker.".to_owned()
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            info: default_info(),
            greeting_hello: default_greeting_hello(),
            greeting_hi: default_greeting_hi(),
            pong: default_pong(),
            reaction: default_reaction(),
            sticker_hint: default_sticker_hint(),
            quotes: QuoteBank::default(),
        }
    }
}

impl ReplyConfig {
    /// Loads reply texts from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Saves reply texts to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ValidationError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_all().into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }

    /// Returns every validation problem, in field order.
    #[must_use]
    pub fn validate_all(&self) -> Vec<Result<(), ValidationError>> {
        let mut results: Vec<Result<(), ValidationError>> = self
            .texts()
            .into_iter()
            .map(|(field, text)| {
                if text.trim().is_empty() {
                    Err(ValidationError::EmptyText { field })
                } else {
                    Ok(())
                }
            })
            .collect();

        let reaction_len = self.reaction.chars().count();
        if reaction_len > MAX_REACTION_CHARS {
            results.push(Err(ValidationError::ReactionTooLong {
                length: reaction_len,
                max_length: MAX_REACTION_CHARS,
            }));
        }

        if self.quotes.is_empty() {
            results.push(Err(ValidationError::NoQuotes));
        }

        for (index, quote) in self.quotes.as_slice().iter().enumerate() {
            if quote.trim().is_empty() {
                results.push(Err(ValidationError::EmptyQuote { index }));
            }
        }

        results
    }

    /// Named text fields, used by validation and the validator report.
    #[must_use]
    pub fn texts(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("welcome", self.welcome.as_str()),
            ("info", self.info.as_str()),
            ("greeting_hello", self.greeting_hello.as_str()),
            ("greeting_hi", self.greeting_hi.as_str()),
            ("pong", self.pong.as_str()),
            ("reaction", self.reaction.as_str()),
            ("sticker_hint", self.sticker_hint.as_str()),
        ]
    }

    /// Returns the `!info` text with the version filled in.
    #[must_use]
    pub fn info_text(&self) -> String {
        self.info.replace("{version}", env!("CARGO_PKG_VERSION"))
    }

    /// Creates an example configuration for users to reference.
    #[must_use]
    pub fn example() -> Self {
        Self::default()
    }
}
