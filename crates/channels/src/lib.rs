//! Message sources for notebridge.
//!
//! A message source delivers user text to the handlers a router registers
//! on it. Sources own everything platform-specific: polling, access
//! control, acknowledgements and voice-to-text.
//!
//! Available sources:
//! - **Telegram**: Bot API long polling with an allowlist
//! - **Local**: in-process source for one-shot commands and tests
//!
//! Speech transcription for voice messages lives in [`transcription`].

pub mod bot_api;
pub mod handlers;
pub mod local;
pub mod telegram;
pub mod transcription;

pub use bot_api::BotApi;
pub use local::LocalSource;
pub use telegram::{Incoming, TelegramSource, classify};
pub use transcription::WhisperTranscriber;
