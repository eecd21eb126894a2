//! Yonote backend. Notes are rows of a Yonote database document.

use async_trait::async_trait;
use notebridge_config::YonoteConfig;
use notebridge_core::note::{done_ids, undone_titles};
use notebridge_core::{BackendError, Note, NoteBackend, NoteId};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::http::{JsonClient, decode, first_string, note_id, truthy};

pub const YONOTE_API_URL: &str = "https://app.yonote.ru";
const PAGE_SIZE: usize = 100;

pub struct YonoteBackend {
    name: String,
    http: JsonClient,
    token: String,
    database_id: String,
    collection_id: String,
    status_field_id: String,
    status_field_value: String,
    done_field_id: String,
}

/// Answer of `POST /api/database.rows.list`.
#[derive(Debug, Deserialize)]
struct RowsAnswer {
    data: Vec<Value>,
}

impl YonoteBackend {
    pub fn from_config(name: impl Into<String>, config: &YonoteConfig) -> Result<Self, BackendError> {
        Ok(Self {
            name: name.into(),
            http: JsonClient::new(config.api_url.as_deref().unwrap_or(YONOTE_API_URL))?,
            token: config.token.clone(),
            database_id: config.database_id.clone(),
            collection_id: config.collection_id.clone(),
            status_field_id: config.status_field_id.clone(),
            status_field_value: config.status_field_value.clone(),
            done_field_id: config.done_field_id.clone(),
        })
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Accept", "application/json".into()),
            ("Authorization", format!("Bearer {}", self.token)),
        ]
    }

    /// All rows of the database, fetched page by page.
    async fn get_notes(&self) -> Result<Vec<Note>, BackendError> {
        let body = json!({ "parentDocumentId": self.database_id });
        let mut notes = Vec::new();
        let mut offset = 0;

        loop {
            let path = format!("/api/database.rows.list?limit={PAGE_SIZE}&offset={offset}");
            let answer = self
                .http
                .request(Method::POST, &path, Some(&body), &self.headers())
                .await?;
            let page: RowsAnswer = decode(answer, "yonote rows")?;
            let fetched = page.data.len();
            for row in &page.data {
                notes.push(self.to_note(row)?);
            }

            if fetched < PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        debug!(backend = %self.name, count = notes.len(), "Yonote notes fetched");
        Ok(notes)
    }

    fn to_note(&self, row: &Value) -> Result<Note, BackendError> {
        let properties = row.get("properties");
        let property = |key: &str| properties.and_then(|p| p.get(key));

        Ok(Note {
            id: note_id(row, "yonote row")?,
            title: row.get("title").and_then(Value::as_str).map(str::to_string),
            status: first_string(property(self.status_field_id.as_str())),
            done: Some(truthy(property(self.done_field_id.as_str()))),
        })
    }
}

#[async_trait]
impl NoteBackend for YonoteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_note(&self, text: &str) -> Result<(), BackendError> {
        let body = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "parentDocumentId": self.database_id,
            "collectionId": self.collection_id,
            "title": text,
            "properties": {
                self.status_field_id.as_str(): [self.status_field_value],
                self.done_field_id.as_str(): 0,
            },
            "type": "row",
            "publish": true,
            "text": "",
        });
        self.http
            .request(Method::POST, "/api/documents.create", Some(&body), &self.headers())
            .await?;
        debug!(backend = %self.name, "Yonote row created");
        Ok(())
    }

    async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError> {
        Ok(undone_titles(&self.get_notes().await?))
    }

    async fn get_done_note_ids(&self) -> Result<Vec<NoteId>, BackendError> {
        Ok(done_ids(&self.get_notes().await?))
    }
}
