//! Telegram message source.
//!
//! Long-polls the Bot API for updates and turns each accepted message into
//! a call of the registered create or list handler. Every update is
//! processed in its own task, so a slow backend never blocks polling.
//! Access is limited to the numeric user ids in `allowed_users`.

use std::sync::Arc;
use std::time::Duration;

use notebridge_config::TelegramConfig;
use notebridge_core::{ChannelError, CreateHandler, ListHandler, MessageSource, Transcriber};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bot_api::{BotApi, Message, TELEGRAM_API_URL, Update};
use crate::handlers::HandlerSlots;

const MESSAGE_RECEIVED: &str = "Message received.";
const VOICE_RECEIVED: &str = "Voice received.";
const MESSAGE_NOT_RECEIVED: &str = "Message not received.";
const NOT_ALLOWED: &str = "You are not allowed to use this bot.";
const GREETING: &str = "Hi! Send me a text or a voice message and I will save it as a note.";
const NO_PENDING_NOTES: &str = "No pending notes.";
const VOICE_FILE_NAME: &str = "voice.ogg";
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// What an inbound message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Start,
    Notes,
    Text(String),
    Voice { file_id: String },
    /// Stickers, photos, unknown commands, blank text
    Ignored,
}

/// Classify a message by its content. Commands may carry a `@botname` suffix.
pub fn classify(message: &Message) -> Incoming {
    if let Some(voice) = &message.voice {
        return Incoming::Voice {
            file_id: voice.file_id.clone(),
        };
    }

    let Some(text) = message.text.as_deref().map(str::trim) else {
        return Incoming::Ignored;
    };
    if text.is_empty() {
        return Incoming::Ignored;
    }

    if text.starts_with('/') {
        let command = text
            .split_whitespace()
            .next()
            .and_then(|c| c.split('@').next())
            .unwrap_or_default();
        return match command {
            "/start" => Incoming::Start,
            "/notes" => Incoming::Notes,
            _ => Incoming::Ignored,
        };
    }

    Incoming::Text(text.to_string())
}

pub struct TelegramSource {
    api: BotApi,
    allowed_users: Vec<String>,
    notes_reply_ttl: Duration,
    poll_timeout_secs: u64,
    transcriber: Option<Arc<dyn Transcriber>>,
    handlers: HandlerSlots,
}

impl TelegramSource {
    pub fn new(config: &TelegramConfig) -> Result<Self, ChannelError> {
        Self::with_api_url(config, TELEGRAM_API_URL)
    }

    /// Build a source talking to a non-default Bot API server.
    pub fn with_api_url(config: &TelegramConfig, api_url: &str) -> Result<Self, ChannelError> {
        if config.token.is_empty() {
            return Err(ChannelError::NotConfigured("telegram.token is empty".into()));
        }
        if config.allowed_users.is_empty() {
            warn!("telegram.allowed_users is empty, every sender will be rejected");
        }

        Ok(Self {
            api: BotApi::new(api_url, config.token.clone())?,
            allowed_users: config.allowed_users.clone(),
            notes_reply_ttl: Duration::from_secs(config.notes_reply_ttl_secs),
            poll_timeout_secs: config.poll_timeout_secs,
            transcriber: None,
            handlers: HandlerSlots::default(),
        })
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Empty list = deny all, `"*"` = allow all.
    pub fn is_allowed(&self, user_id: Option<i64>) -> bool {
        if self.allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        let Some(user_id) = user_id else {
            return false;
        };
        let user_id = user_id.to_string();
        self.allowed_users.iter().any(|u| *u == user_id)
    }

    /// Poll for updates until `shutdown` flips to true (or its sender is
    /// dropped), then wait for every in-flight update task to finish.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), ChannelError> {
        info!(timeout = self.poll_timeout_secs, "Telegram polling started");
        let mut offset = 0_i64;
        let mut tasks = JoinSet::new();

        while !*shutdown.borrow() {
            let polled = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.api.get_updates(offset, self.poll_timeout_secs) => result,
            };

            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let source = Arc::clone(&self);
                        tasks.spawn(async move { source.handle_update(update).await });
                    }
                }
                Err(ChannelError::NotConfigured(reason)) => {
                    error!(%reason, "Telegram polling stopped");
                    drain(&mut tasks).await;
                    return Err(ChannelError::NotConfigured(reason));
                }
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, retrying");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }

            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    error!(error = %e, "Update task panicked");
                }
            }
        }

        info!(in_flight = tasks.len(), "Telegram polling stopped, draining updates");
        drain(&mut tasks).await;
        Ok(())
    }

    /// Process one update. Failures are logged, never propagated.
    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "Skipping non-message update");
            return;
        };
        if let Err(e) = self.dispatch(&message).await {
            warn!(
                chat_id = message.chat.id,
                message_id = message.message_id,
                error = %e,
                "Failed to answer Telegram message"
            );
        }
    }

    async fn dispatch(&self, message: &Message) -> Result<(), ChannelError> {
        let chat_id = message.chat.id;
        let user_id = message.from.as_ref().map(|u| u.id);

        if !self.is_allowed(user_id) {
            warn!(user_id = ?user_id, "Rejected message from user not in allowlist");
            self.api.send_message(chat_id, NOT_ALLOWED, None).await?;
            return Ok(());
        }

        match classify(message) {
            Incoming::Start => {
                self.api
                    .send_message(chat_id, GREETING, Some(notes_keyboard()))
                    .await?;
            }
            Incoming::Notes => self.reply_with_notes(message).await?,
            Incoming::Text(text) => self.save(message, text, MESSAGE_RECEIVED).await?,
            Incoming::Voice { file_id } => {
                let text = self.voice_text(&file_id).await;
                self.save(message, text, VOICE_RECEIVED).await?;
            }
            Incoming::Ignored => {
                debug!(chat_id, message_id = message.message_id, "Ignoring message");
            }
        }
        Ok(())
    }

    /// Hand `text` to the create handler and acknowledge. The user's
    /// message is removed once the note is saved.
    async fn save(&self, message: &Message, text: String, ack: &str) -> Result<(), ChannelError> {
        let chat_id = message.chat.id;
        match self.handlers.create(self.name(), text).await {
            Ok(()) => {
                self.api.send_message(chat_id, ack, None).await?;
                self.api.delete_message(chat_id, message.message_id).await?;
            }
            Err(e) => {
                error!(chat_id, error = %e, "Note was not saved");
                self.api.send_message(chat_id, MESSAGE_NOT_RECEIVED, None).await?;
            }
        }
        Ok(())
    }

    async fn reply_with_notes(&self, message: &Message) -> Result<(), ChannelError> {
        let chat_id = message.chat.id;
        let report = match self.handlers.list(self.name()).await {
            Ok(report) if report.trim().is_empty() => NO_PENDING_NOTES.to_string(),
            Ok(report) => report,
            Err(e) => {
                error!(chat_id, error = %e, "Failed to list pending notes");
                self.api.send_message(chat_id, MESSAGE_NOT_RECEIVED, None).await?;
                return Ok(());
            }
        };

        let reply = self.api.send_message(chat_id, &report, None).await?;
        self.api.delete_message(chat_id, message.message_id).await?;

        // Part of the update task: the polling drain waits for it.
        tokio::time::sleep(self.notes_reply_ttl).await;
        if let Err(e) = self.api.delete_message(chat_id, reply.message_id).await {
            debug!(chat_id, error = %e, "Failed to delete notes reply");
        }
        Ok(())
    }

    /// Transcribe a voice message. Without a transcriber, or when
    /// transcription fails, the voice file id stands in for the text.
    async fn voice_text(&self, file_id: &str) -> String {
        let Some(transcriber) = &self.transcriber else {
            return file_id.to_string();
        };

        let audio = async {
            let file = self.api.get_file(file_id).await?;
            let path = file.file_path.ok_or_else(|| {
                ChannelError::InvalidPayload(format!("getFile returned no path for {file_id}"))
            })?;
            self.api.download_file(&path).await
        };

        let audio = match audio.await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(file_id, error = %e, "Voice download failed");
                return file_id.to_string();
            }
        };

        match transcriber.transcribe(audio, VOICE_FILE_NAME).await {
            Ok(text) => text,
            Err(e) => {
                warn!(file_id, error = %e, "Voice transcription failed");
                file_id.to_string()
            }
        }
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(done) = tasks.join_next().await {
        if let Err(e) = done {
            error!(error = %e, "Update task panicked");
        }
    }
}

fn notes_keyboard() -> Value {
    json!({
        "keyboard": [[ { "text": "/notes" } ]],
        "resize_keyboard": true
    })
}

impl MessageSource for TelegramSource {
    fn name(&self) -> &str {
        "telegram"
    }

    fn register_create_handler(&self, handler: CreateHandler) {
        self.handlers.set_create(handler);
    }

    fn register_list_handler(&self, handler: ListHandler) {
        self.handlers.set_list(handler);
    }
}
