//! Teamly backend. Notes are articles in a Teamly content database.
//!
//! Teamly uses an integration flow: a one-time auth code is exchanged for
//! an access/refresh token pair, and the pair is refreshed as it expires.
//! Tokens are kept in memory and mirrored to a JSON file under the data
//! directory so restarts do not burn the auth code again.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notebridge_config::TeamlyConfig;
use notebridge_core::note::{done_ids, undone_titles};
use notebridge_core::{BackendError, Note, NoteBackend, NoteId};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::http::{JsonClient, decode, first_string, note_id, truthy};

pub const TEAMLY_API_URL: &str = "https://app4.teamly.ru";
const AUTHORIZE_PATH: &str = "/api/v1/auth/integration/authorize";
const REFRESH_PATH: &str = "/api/v1/auth/integration/refresh";
const COMMAND_PATH: &str = "/api/v1/wiki/properties/command/execute";
const CONTENT_QUERY_PATH: &str = "/api/v1/ql/content-database/content";

/// Cached integration tokens. Expiry fields are unix timestamps in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token_expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token_expires_at: Option<i64>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl AuthTokens {
    fn refresh_expired(&self, now: i64) -> bool {
        self.refresh_token.is_none() || self.refresh_token_expires_at.is_none_or(|at| at <= now)
    }

    fn access_expired(&self, now: i64) -> bool {
        self.access_token.is_none() || self.access_token_expires_at.is_none_or(|at| at <= now)
    }
}

#[derive(Debug, Deserialize)]
struct AuthAnswer {
    access_token: String,
    refresh_token: String,
    access_token_expires_at: i64,
    refresh_token_expires_at: i64,
    #[serde(default)]
    accounts: Vec<Value>,
}

impl AuthAnswer {
    fn into_tokens(self) -> Result<AuthTokens, BackendError> {
        let slug = self
            .accounts
            .first()
            .and_then(|a| a.get("slug"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BackendError::MalformedResponse("Teamly auth answer has no account slug".into())
            })?;

        Ok(AuthTokens {
            access_token: Some(self.access_token),
            refresh_token: Some(self.refresh_token),
            access_token_expires_at: Some(self.access_token_expires_at),
            refresh_token_expires_at: Some(self.refresh_token_expires_at),
            slug: Some(slug.to_string()),
        })
    }
}

/// Token manager for one Teamly integration.
pub struct TeamlyAuth {
    http: JsonClient,
    token_path: PathBuf,
    integration_id: String,
    integration_url: String,
    client_secret: String,
    client_auth_code: String,
    tokens: Mutex<Option<AuthTokens>>,
}

impl TeamlyAuth {
    pub fn new(http: JsonClient, data_dir: &Path, config: &TeamlyConfig) -> Self {
        Self {
            http,
            token_path: token_file(data_dir, &config.integration_id),
            integration_id: config.integration_id.clone(),
            integration_url: config.integration_url.clone(),
            client_secret: config.client_secret.clone(),
            client_auth_code: config.client_auth_code.clone(),
            tokens: Mutex::new(None),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Headers for an authenticated request, authorizing or refreshing first
    /// when the cached tokens are missing or expired.
    pub async fn token_headers(&self) -> Result<Vec<(&'static str, String)>, BackendError> {
        let mut cached = self.tokens.lock().await;
        let mut tokens = match cached.take() {
            Some(tokens) => tokens,
            None => self.read_tokens().await,
        };

        let now = chrono::Utc::now().timestamp();
        if tokens.refresh_expired(now) {
            tokens = self.authorize().await?;
            self.write_tokens(&tokens).await;
        }
        if tokens.access_expired(now) {
            let refresh_token = tokens.refresh_token.clone().unwrap_or_default();
            tokens = self.refresh(&refresh_token).await?;
            self.write_tokens(&tokens).await;
        }

        let headers = vec![
            ("X-Account-Slug", tokens.slug.clone().unwrap_or_default()),
            (
                "Authorization",
                format!("Bearer {}", tokens.access_token.as_deref().unwrap_or_default()),
            ),
        ];
        *cached = Some(tokens);
        Ok(headers)
    }

    async fn authorize(&self) -> Result<AuthTokens, BackendError> {
        info!(integration = %self.integration_id, "Teamly authorization");
        let body = json!({
            "client_id": self.integration_id,
            "redirect_uri": self.integration_url,
            "client_secret": self.client_secret,
            "code": self.client_auth_code,
        });
        let answer = self
            .http
            .request(Method::POST, AUTHORIZE_PATH, Some(&body), &[])
            .await?;
        decode::<AuthAnswer>(answer, "teamly authorize")?.into_tokens()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, BackendError> {
        debug!(integration = %self.integration_id, "Teamly token refresh");
        let body = json!({
            "client_id": self.integration_id,
            "client_secret": self.client_secret,
            "refresh_token": refresh_token,
        });
        let answer = self
            .http
            .request(Method::POST, REFRESH_PATH, Some(&body), &[])
            .await?;
        decode::<AuthAnswer>(answer, "teamly refresh")?.into_tokens()
    }

    /// Missing or unreadable token files count as "no tokens yet".
    async fn read_tokens(&self) -> AuthTokens {
        match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %self.token_path.display(), error = %e, "Ignoring invalid Teamly token file");
                AuthTokens::default()
            }),
            Err(_) => AuthTokens::default(),
        }
    }

    /// Persisting is best effort; the in-memory copy stays authoritative.
    async fn write_tokens(&self, tokens: &AuthTokens) {
        if let Some(parent) = self.token_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %e, "Failed to create data directory");
                return;
            }
        }
        let content = match serde_json::to_string(tokens) {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "Failed to serialize Teamly tokens");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.token_path, content).await {
            warn!(path = %self.token_path.display(), error = %e, "Failed to write Teamly token file");
        }
    }
}

/// Token cache location for one integration.
pub fn token_file(data_dir: &Path, integration_id: &str) -> PathBuf {
    data_dir.join(format!("teamly_tokens_{integration_id}.json"))
}

pub struct TeamlyBackend {
    name: String,
    http: JsonClient,
    auth: TeamlyAuth,
    database_id: String,
    status_field_id: String,
    status_field_value: String,
    done_field_id: String,
}

impl TeamlyBackend {
    pub fn from_config(
        name: impl Into<String>,
        config: &TeamlyConfig,
        data_dir: &Path,
    ) -> Result<Self, BackendError> {
        let http = JsonClient::new(config.api_url.as_deref().unwrap_or(TEAMLY_API_URL))?;
        Ok(Self {
            name: name.into(),
            auth: TeamlyAuth::new(http.clone(), data_dir, config),
            http,
            database_id: config.database_id.clone(),
            status_field_id: config.status_field_id.clone(),
            status_field_value: config.status_field_value.clone(),
            done_field_id: config.done_field_id.clone(),
        })
    }

    pub fn auth(&self) -> &TeamlyAuth {
        &self.auth
    }

    async fn get_notes(&self) -> Result<Vec<Note>, BackendError> {
        let body = json!({
            "query": {
                "__filter": { "contentDatabaseId": self.database_id },
                "id": true,
                "title": true,
                "content": {
                    "article": {
                        "id": true,
                        "properties": { "properties": true }
                    }
                }
            }
        });
        let headers = self.auth.token_headers().await?;
        let answer = self
            .http
            .request(Method::POST, CONTENT_QUERY_PATH, Some(&body), &headers)
            .await?;

        let notes = rows(&answer)?
            .iter()
            .map(|row| self.to_note(row))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(backend = %self.name, count = notes.len(), "Teamly notes fetched");
        Ok(notes)
    }

    fn to_note(&self, row: &Value) -> Result<Note, BackendError> {
        let properties = row
            .pointer("/content/article/properties/properties")
            .or_else(|| row.get("properties"));
        let property = |key: &str| properties.and_then(|p| p.get(key));

        Ok(Note {
            id: note_id(row, "teamly content row")?,
            title: row.get("title").and_then(Value::as_str).map(str::to_string),
            status: first_string(property(self.status_field_id.as_str())),
            done: Some(truthy(property(self.done_field_id.as_str()))),
        })
    }
}

/// Content rows of a QL answer: a bare array, or an array under `items`/`data`.
fn rows(answer: &Value) -> Result<&[Value], BackendError> {
    let list = match answer {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get("items")
            .or_else(|| map.get("data"))
            .and_then(Value::as_array),
        _ => None,
    };
    list.map(Vec::as_slice).ok_or_else(|| {
        BackendError::MalformedResponse("Teamly content answer has no rows".into())
    })
}

#[async_trait]
impl NoteBackend for TeamlyBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_note(&self, text: &str) -> Result<(), BackendError> {
        let body = json!({
            "code": "article_create",
            "payload": {
                "entity": {
                    "spaceId": self.database_id,
                    "id": uuid::Uuid::new_v4().to_string(),
                    "properties": [
                        { "method": "add", "code": "title", "value": { "text": text } },
                        { "method": "add", "code": self.status_field_id, "value": self.status_field_value }
                    ]
                }
            }
        });
        let headers = self.auth.token_headers().await?;
        self.http
            .request(Method::POST, COMMAND_PATH, Some(&body), &headers)
            .await?;
        debug!(backend = %self.name, "Teamly article created");
        Ok(())
    }

    async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError> {
        Ok(undone_titles(&self.get_notes().await?))
    }

    async fn get_done_note_ids(&self) -> Result<Vec<NoteId>, BackendError> {
        Ok(done_ids(&self.get_notes().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> TeamlyBackend {
        let config = TeamlyConfig {
            integration_id: "int".into(),
            database_id: "db".into(),
            status_field_id: "status".into(),
            status_field_value: "new".into(),
            done_field_id: "done".into(),
            ..TeamlyConfig::default()
        };
        TeamlyBackend::from_config("teamly", &config, Path::new("tmp")).unwrap()
    }

    #[test]
    fn expiry_checks() {
        let tokens = AuthTokens {
            access_token: Some("a".into()),
            refresh_token: Some("r".into()),
            access_token_expires_at: Some(100),
            refresh_token_expires_at: Some(1000),
            slug: Some("acme".into()),
        };
        assert!(!tokens.refresh_expired(500));
        assert!(tokens.access_expired(500));
        assert!(!tokens.access_expired(50));
        assert!(AuthTokens::default().refresh_expired(0));
        assert!(AuthTokens::default().access_expired(0));
    }

    #[test]
    fn auth_answer_takes_first_account_slug() {
        let answer: AuthAnswer = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "access_token_expires_at": 10,
            "refresh_token_expires_at": 20,
            "accounts": [ { "slug": "acme" }, { "slug": "other" } ]
        }))
        .unwrap();
        let tokens = answer.into_tokens().unwrap();
        assert_eq!(tokens.slug.as_deref(), Some("acme"));
        assert_eq!(tokens.refresh_token_expires_at, Some(20));
    }

    #[test]
    fn auth_answer_without_accounts_is_rejected() {
        let answer: AuthAnswer = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "access_token_expires_at": 10,
            "refresh_token_expires_at": 20
        }))
        .unwrap();
        assert!(matches!(
            answer.into_tokens(),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn row_is_mapped_to_note() {
        let row = json!({
            "id": "a-1",
            "title": "Call mom",
            "content": { "article": { "id": "a-1", "properties": { "properties": {
                "status": ["In work"],
                "done": true
            } } } }
        });
        let note = backend().to_note(&row).unwrap();
        assert_eq!(note.id, NoteId::from("a-1"));
        assert_eq!(note.title.as_deref(), Some("Call mom"));
        assert_eq!(note.status.as_deref(), Some("In work"));
        assert!(note.is_done());
    }

    #[test]
    fn row_without_id_is_malformed() {
        let row = json!({
            "title": "Call mom",
            "content": { "article": { "properties": { "properties": { "done": true } } } }
        });
        assert!(matches!(
            backend().to_note(&row),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn rows_accepts_known_shapes() {
        assert_eq!(rows(&json!([1, 2])).unwrap().len(), 2);
        assert_eq!(rows(&json!({ "items": [1] })).unwrap().len(), 1);
        assert_eq!(rows(&json!({ "data": [] })).unwrap().len(), 0);
        assert!(rows(&json!({ "other": 1 })).is_err());
    }

    #[test]
    fn token_file_is_per_integration() {
        let path = token_file(Path::new("/data"), "abc");
        assert_eq!(path, PathBuf::from("/data/teamly_tokens_abc.json"));
    }
}
