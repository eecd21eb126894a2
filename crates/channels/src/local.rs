//! In-process message source.
//!
//! Nothing is received from the outside: callers push text in with
//! [`LocalSource::submit`] and ask for the pending-notes report with
//! [`LocalSource::request_list`]. The CLI's one-shot commands and the
//! integration tests drive the router this way.

use notebridge_core::{CreateHandler, ListHandler, MessageSource, Result};
use tracing::debug;

use crate::handlers::HandlerSlots;

#[derive(Default)]
pub struct LocalSource {
    handlers: HandlerSlots,
}

impl LocalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `text` as if a user had sent it.
    pub async fn submit(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        debug!(len = text.len(), "Local message submitted");
        self.handlers.create(self.name(), text).await
    }

    /// Ask for the pending-notes report.
    pub async fn request_list(&self) -> Result<String> {
        self.handlers.list(self.name()).await
    }

    /// Whether a router has wired itself to this source.
    pub fn is_wired(&self) -> bool {
        self.handlers.has_create() && self.handlers.has_list()
    }
}

impl MessageSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn register_create_handler(&self, handler: CreateHandler) {
        self.handlers.set_create(handler);
    }

    fn register_list_handler(&self, handler: ListHandler) {
        self.handlers.set_list(handler);
    }
}
