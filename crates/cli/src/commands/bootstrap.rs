//! Shared wiring: configured backends plus a message source make a router.

use std::sync::Arc;

use notebridge_backends::build_from_config;
use notebridge_config::AppConfig;
use notebridge_core::{BackendError, MessageSource};
use notebridge_router::NotesRouter;
use tracing::info;

/// Build every configured backend, register it on a router bound to
/// `source` and start the router.
pub fn start_router(
    config: &AppConfig,
    source: Arc<dyn MessageSource>,
) -> Result<Arc<NotesRouter>, BackendError> {
    let configured = build_from_config(config)?;
    if configured.is_empty() {
        info!("No backends configured, notes will be dropped");
    }

    let mut router = NotesRouter::new(source);
    for entry in configured {
        router.register_backend(entry.backend, entry.delete_done_notes, entry.start_words);
    }

    let router = Arc::new(router);
    router.start();
    Ok(router)
}
