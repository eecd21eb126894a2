//! NoteBackend trait: the abstraction over note-taking backends.
//!
//! A backend connects notebridge to one external note store (Notion,
//! Teamly, Yonote, ...). Backends differ in what they can do: every
//! backend creates notes and lists pending ones, but not all of them can
//! list completed notes or delete them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Identifier of a note, unique within one backend only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(pub String);

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        NoteId(s.to_string())
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        NoteId(s)
    }
}

/// A single item in a backend's store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Backend-specific status label or id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

/// Width of the status tag in pending-note listings.
const STATUS_TAG_WIDTH: usize = 5;

impl Note {
    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }

    /// Render the note as a pending-list line: `[<status>] <title>`.
    ///
    /// The status is cut to its first five characters; a missing status
    /// renders as `-` and a missing title as an empty string.
    pub fn pending_title(&self) -> String {
        let status: String = match self.status.as_deref() {
            Some(s) if !s.is_empty() => s.chars().take(STATUS_TAG_WIDTH).collect(),
            _ => "-".into(),
        };
        format!("[{}] {}", status, self.title.as_deref().unwrap_or_default())
    }
}

/// Sorted pending-list lines for every note that is not done.
pub fn undone_titles(notes: &[Note]) -> Vec<String> {
    let mut titles: Vec<String> = notes
        .iter()
        .filter(|n| !n.is_done())
        .map(Note::pending_title)
        .collect();
    titles.sort();
    titles
}

/// Ids of every note that is done, in backend order.
pub fn done_ids(notes: &[Note]) -> Vec<NoteId> {
    notes
        .iter()
        .filter(|n| n.is_done())
        .map(|n| n.id.clone())
        .collect()
}

/// The core NoteBackend trait.
///
/// `create_note` and `get_undone_note_titles` are mandatory. Backends that
/// cannot list completed notes or delete them keep the default
/// implementations, which fail fast with [`BackendError::Unsupported`].
#[async_trait]
pub trait NoteBackend: Send + Sync {
    /// Human-readable backend name, used as the header in note listings.
    fn name(&self) -> &str;

    /// Create a new note whose title is `text`.
    async fn create_note(&self, text: &str) -> Result<(), BackendError>;

    /// Titles of pending notes, pre-formatted as `[<status>] <title>`.
    async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError>;

    /// Ids of notes marked done in the backend's own UI.
    async fn get_done_note_ids(&self) -> Result<Vec<NoteId>, BackendError> {
        Err(BackendError::unsupported(self.name(), "get_done_note_ids"))
    }

    /// Delete (or archive) a note.
    async fn delete_note(&self, _id: &NoteId) -> Result<(), BackendError> {
        Err(BackendError::unsupported(self.name(), "delete_note"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, title: Option<&str>, status: Option<&str>, done: Option<bool>) -> Note {
        Note {
            id: id.into(),
            title: title.map(Into::into),
            status: status.map(Into::into),
            done,
        }
    }

    #[test]
    fn pending_title_truncates_status() {
        let n = note("1", Some("Buy milk"), Some("In progress"), Some(false));
        assert_eq!(n.pending_title(), "[In pr] Buy milk");
    }

    #[test]
    fn pending_title_handles_missing_fields() {
        let n = note("1", None, None, None);
        assert_eq!(n.pending_title(), "[-] ");
    }

    #[test]
    fn pending_title_truncates_on_char_boundary() {
        let n = note("1", Some("Молоко"), Some("Не начато"), None);
        assert_eq!(n.pending_title(), "[Не на] Молоко");
    }

    #[test]
    fn undone_titles_are_sorted_and_skip_done() {
        let notes = vec![
            note("1", Some("zeta"), Some("new"), Some(false)),
            note("2", Some("alpha"), Some("new"), None),
            note("3", Some("done one"), Some("new"), Some(true)),
        ];
        assert_eq!(undone_titles(&notes), vec!["[new] alpha", "[new] zeta"]);
    }

    #[test]
    fn done_ids_preserve_order() {
        let notes = vec![
            note("b", None, None, Some(true)),
            note("x", None, None, Some(false)),
            note("a", None, None, Some(true)),
        ];
        assert_eq!(done_ids(&notes), vec![NoteId::from("b"), NoteId::from("a")]);
    }

    struct CreateOnly;

    #[async_trait]
    impl NoteBackend for CreateOnly {
        fn name(&self) -> &str {
            "create-only"
        }
        async fn create_note(&self, _text: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn default_capabilities_are_unsupported() {
        let backend = CreateOnly;
        let err = backend.delete_note(&NoteId::from("1")).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Unsupported { operation: "delete_note", .. }
        ));
        assert!(backend.get_done_note_ids().await.unwrap_err().is_unsupported());
    }
}
