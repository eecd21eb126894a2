//! Thin client for the subset of the Telegram Bot API notebridge needs.

use std::time::Duration;

use notebridge_core::ChannelError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::trace;

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CHANNEL: &str = "telegram";

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<Voice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    pub file_id: String,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Every Bot API answer is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct BotApi {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for BotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApi")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl BotApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, ChannelError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        trace!(method, "Telegram API call");

        let mut request = self.client.post(&url).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(format!("{method}: {e}")))?;

        let status = response.status().as_u16();
        if status == 401 {
            return Err(ChannelError::NotConfigured("Telegram rejected the bot token".into()));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("{method}: {e}")))?;

        match envelope {
            Envelope { ok: true, result: Some(result), .. } => Ok(result),
            Envelope { description, .. } => Err(ChannelError::DeliveryFailed {
                channel: CHANNEL.into(),
                reason: format!(
                    "{method}: {}",
                    description.unwrap_or_else(|| format!("status {status}"))
                ),
            }),
        }
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ChannelError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        // The HTTP timeout must outlast the server-side long poll.
        let timeout = Duration::from_secs(timeout_secs) + REQUEST_TIMEOUT;
        self.call("getUpdates", &body, Some(timeout)).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<Message, ChannelError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call("sendMessage", &body, None).await
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChannelError> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id });
        self.call::<bool>("deleteMessage", &body, None).await.map(|_| ())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, ChannelError> {
        self.call("getFile", &json!({ "file_id": file_id }), None).await
    }

    /// Download a file previously resolved with [`BotApi::get_file`].
    pub async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, ChannelError> {
        let url = format!("{}/file/bot{}/{}", self.base_url, self.token, file_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(format!("file download: {e}")))?;

        if !response.status().is_success() {
            return Err(ChannelError::DeliveryFailed {
                channel: CHANNEL.into(),
                reason: format!("file download returned {}", response.status()),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ChannelError::ConnectionLost(format!("file download: {e}")))
    }
}
