//! In-memory backend, useful for dry runs and tests.

use std::sync::Arc;

use async_trait::async_trait;
use notebridge_core::note::{done_ids, undone_titles};
use notebridge_core::{BackendError, Note, NoteBackend, NoteId};
use tokio::sync::RwLock;
use uuid::Uuid;

const NEW_STATUS: &str = "new";

/// A backend that keeps notes in a `Vec`. Clones share the same store.
#[derive(Clone)]
pub struct InMemoryBackend {
    name: String,
    notes: Arc<RwLock<Vec<Note>>>,
}

impl InMemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Snapshot of every stored note, in creation order.
    pub async fn notes(&self) -> Vec<Note> {
        self.notes.read().await.clone()
    }

    /// Mark the first note with this title as done. Returns false when no
    /// such note exists.
    pub async fn mark_done(&self, title: &str) -> bool {
        let mut notes = self.notes.write().await;
        match notes.iter_mut().find(|n| n.title.as_deref() == Some(title)) {
            Some(note) => {
                note.done = Some(true);
                true
            }
            None => false,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl NoteBackend for InMemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_note(&self, text: &str) -> Result<(), BackendError> {
        self.notes.write().await.push(Note {
            id: NoteId(Uuid::new_v4().to_string()),
            title: Some(text.to_string()),
            status: Some(NEW_STATUS.into()),
            done: Some(false),
        });
        Ok(())
    }

    async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError> {
        Ok(undone_titles(&self.notes.read().await))
    }

    async fn get_done_note_ids(&self) -> Result<Vec<NoteId>, BackendError> {
        Ok(done_ids(&self.notes.read().await))
    }

    async fn delete_note(&self, id: &NoteId) -> Result<(), BackendError> {
        let mut notes = self.notes.write().await;
        let before = notes.len();
        notes.retain(|n| &n.id != id);
        if notes.len() == before {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
