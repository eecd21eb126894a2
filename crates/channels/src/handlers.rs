//! Handler slots shared by the message source implementations.

use std::sync::{Mutex, MutexGuard};

use notebridge_core::{ChannelError, CreateHandler, Error, ListHandler, Result};

/// The create/list callbacks registered on a source. Registering again
/// replaces the previous handler.
#[derive(Default)]
pub struct HandlerSlots {
    create: Mutex<Option<CreateHandler>>,
    list: Mutex<Option<ListHandler>>,
}

/// Handler slots hold no invariants a panic could break, so a poisoned
/// lock is still usable.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HandlerSlots {
    pub fn set_create(&self, handler: CreateHandler) {
        *lock(&self.create) = Some(handler);
    }

    pub fn set_list(&self, handler: ListHandler) {
        *lock(&self.list) = Some(handler);
    }

    pub fn has_create(&self) -> bool {
        lock(&self.create).is_some()
    }

    pub fn has_list(&self) -> bool {
        lock(&self.list).is_some()
    }

    /// Invoke the create handler. The lock is released before awaiting.
    pub async fn create(&self, source: &str, text: String) -> Result<()> {
        let handler = lock(&self.create).clone().ok_or_else(|| not_registered(source, "create"))?;
        handler(text).await
    }

    /// Invoke the list handler.
    pub async fn list(&self, source: &str) -> Result<String> {
        let handler = lock(&self.list).clone().ok_or_else(|| not_registered(source, "list"))?;
        handler().await
    }
}

fn not_registered(source: &str, kind: &str) -> Error {
    ChannelError::NotConfigured(format!("no {kind} handler registered on {source}")).into()
}
