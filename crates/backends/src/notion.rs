//! Notion backend. Notes are pages in a Notion database.
//!
//! New pages get the title property `Name` and the configured status;
//! a checkbox property marks a page as done. Deleting a note archives
//! the page.

use async_trait::async_trait;
use notebridge_config::NotionConfig;
use notebridge_core::note::{done_ids, undone_titles};
use notebridge_core::{BackendError, Note, NoteBackend, NoteId};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::http::{JsonClient, decode, note_id};

pub const NOTION_API_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";
const TITLE_PROPERTY: &str = "Name";

pub struct NotionBackend {
    name: String,
    http: JsonClient,
    token: String,
    database_id: String,
    status_field_id: String,
    status_field_value: String,
    done_field_id: String,
}

/// Answer of `POST /v1/databases/{id}/query`.
#[derive(Debug, Deserialize)]
struct QueryAnswer {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl NotionBackend {
    pub fn from_config(name: impl Into<String>, config: &NotionConfig) -> Result<Self, BackendError> {
        let base_url = config.api_url.as_deref().unwrap_or(NOTION_API_URL);
        Ok(Self {
            name: name.into(),
            http: JsonClient::new(base_url)?,
            token: config.token.clone(),
            database_id: config.database_id.clone(),
            status_field_id: config.status_field_id.clone(),
            status_field_value: config.status_field_value.clone(),
            done_field_id: config.done_field_id.clone(),
        })
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Accept", "application/json".into()),
            ("Authorization", format!("Bearer {}", self.token)),
            ("Notion-Version", NOTION_VERSION.into()),
        ]
    }

    /// Query the database, following pagination, filtered on the done checkbox.
    async fn query_notes(&self, done: bool) -> Result<Vec<Note>, BackendError> {
        let path = format!("/v1/databases/{}/query", self.database_id);
        let mut notes = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": {
                    "property": self.done_field_id,
                    "checkbox": { "equals": done }
                }
            });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let answer = self
                .http
                .request(Method::POST, &path, Some(&body), &self.headers())
                .await?;
            let page: QueryAnswer = decode(answer, "notion query")?;
            for result in &page.results {
                notes.push(self.to_note(result)?);
            }

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(backend = %self.name, done, count = notes.len(), "Notion notes fetched");
        Ok(notes)
    }

    fn to_note(&self, page: &Value) -> Result<Note, BackendError> {
        let id = note_id(page, "notion page")?;
        let properties = page.get("properties");
        let property = |key: &str| properties.and_then(|p| p.get(key));

        let title = property(TITLE_PROPERTY)
            .and_then(|p| p.get("title"))
            .and_then(|t| t.get(0))
            .and_then(|t| t.get("plain_text"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let status = property(self.status_field_id.as_str())
            .and_then(|p| p.get("status"))
            .and_then(|s| s.get("name").or_else(|| s.get("id")))
            .and_then(Value::as_str)
            .map(str::to_string);

        let done = property(self.done_field_id.as_str())
            .and_then(|p| p.get("checkbox"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Note {
            id,
            title,
            status,
            done: Some(done),
        })
    }
}

#[async_trait]
impl NoteBackend for NotionBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_note(&self, text: &str) -> Result<(), BackendError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": {
                TITLE_PROPERTY: { "title": [ { "text": { "content": text } } ] },
                self.status_field_id.as_str(): { "status": { "id": self.status_field_value } },
            }
        });
        let answer = self
            .http
            .request(Method::POST, "/v1/pages", Some(&body), &self.headers())
            .await?;
        debug!(backend = %self.name, page_id = ?answer.get("id"), "Notion page created");
        Ok(())
    }

    async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError> {
        Ok(undone_titles(&self.query_notes(false).await?))
    }

    async fn get_done_note_ids(&self) -> Result<Vec<NoteId>, BackendError> {
        Ok(done_ids(&self.query_notes(true).await?))
    }

    async fn delete_note(&self, id: &NoteId) -> Result<(), BackendError> {
        let body = json!({ "archived": true });
        self.http
            .request(
                Method::PATCH,
                &format!("/v1/pages/{id}"),
                Some(&body),
                &self.headers(),
            )
            .await?;
        debug!(backend = %self.name, note_id = %id, "Notion page archived");
        Ok(())
    }
}
