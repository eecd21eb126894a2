//! Yandex Alice skill webhook.
//!
//! Alice posts every utterance of a skill session here. Only the configured
//! Alice user may dictate notes; everything else gets a generic error
//! phrase. Alice expects the same answer shape for success and failure, so
//! every reply is `201 Created` with a JSON body.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::SharedContext;

pub const SCENARIO_ERROR: &str = "Scenario error";
pub const NOTE_SAVED: &str = "Note saved";
pub const NOTE_NOT_SAVED: &str = "Note not saved";
pub const GREETING: &str = "Hi! Dictate your note";

/// Incoming Alice request. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct AliceMessage {
    #[serde(default)]
    pub session: Option<Value>,
    #[serde(default)]
    pub request: Option<Value>,
    #[serde(default)]
    pub version: Option<String>,
}

impl AliceMessage {
    pub fn user_id(&self) -> Option<&str> {
        self.session
            .as_ref()?
            .get("user")?
            .get("user_id")?
            .as_str()
    }

    /// The raw utterance, if it carries any text.
    pub fn utterance(&self) -> Option<&str> {
        self.request
            .as_ref()?
            .get("original_utterance")?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AliceReply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AliceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub response: AliceReply,
}

impl AliceResponse {
    fn scenario_error() -> Self {
        Self {
            session: None,
            version: None,
            response: AliceReply {
                text: SCENARIO_ERROR.into(),
                end_session: None,
            },
        }
    }

    fn reply(message: AliceMessage, text: &str, end_session: bool) -> Self {
        Self {
            session: message.session,
            version: message.version,
            response: AliceReply {
                text: text.into(),
                end_session: Some(end_session),
            },
        }
    }
}

/// `POST /api/v1/alice/message/`
pub async fn message_handler(
    State(ctx): State<SharedContext>,
    body: Bytes,
) -> (StatusCode, Json<AliceResponse>) {
    (StatusCode::CREATED, Json(handle(&ctx, &body).await))
}

async fn handle(ctx: &SharedContext, body: &[u8]) -> AliceResponse {
    let message: AliceMessage = match serde_json::from_slice(body) {
        Ok(message) => message,
        Err(e) => {
            error!(error = %e, "Alice request parsing error");
            return AliceResponse::scenario_error();
        }
    };

    let user_id = message.user_id();
    if ctx.alice_user_id.is_none() || user_id != ctx.alice_user_id.as_deref() {
        warn!(user_id = ?user_id, "Alice request from unknown user");
        return AliceResponse::scenario_error();
    }

    let Some(text) = message.utterance().map(str::to_string) else {
        return AliceResponse::reply(message, GREETING, false);
    };

    info!(text_len = text.len(), "Note dictated through Alice");
    match ctx.router.create_note(&text).await {
        Ok(_) => AliceResponse::reply(message, NOTE_SAVED, true),
        Err(e) => {
            error!(error = %e, "Failed to save note from Alice");
            AliceResponse::reply(message, NOTE_NOT_SAVED, false)
        }
    }
}
