//! Note backend implementations for notebridge.
//!
//! All backends implement the `notebridge_core::NoteBackend` trait.
//! [`build_from_config`] turns the `[[backends]]` configuration list into
//! ready-to-register backends.

pub mod http;
pub mod memory;
pub mod notion;
pub mod teamly;
pub mod yonote;

use std::sync::Arc;

use notebridge_config::{AppConfig, BackendConfig};
use notebridge_core::{BackendError, NoteBackend};
use tracing::info;

pub use http::JsonClient;
pub use memory::InMemoryBackend;
pub use notion::NotionBackend;
pub use teamly::{TeamlyAuth, TeamlyBackend};
pub use yonote::YonoteBackend;

/// A backend together with its routing options.
#[derive(Clone)]
pub struct ConfiguredBackend {
    pub backend: Arc<dyn NoteBackend>,
    pub delete_done_notes: bool,
    pub start_words: Vec<String>,
}

impl std::fmt::Debug for ConfiguredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredBackend")
            .field("backend", &self.backend.name())
            .field("delete_done_notes", &self.delete_done_notes)
            .field("start_words", &self.start_words)
            .finish()
    }
}

/// Instantiate a single backend from its configuration entry.
pub fn build_backend(
    config: &BackendConfig,
    app_config: &AppConfig,
) -> Result<Arc<dyn NoteBackend>, BackendError> {
    let name = config.label();
    let backend: Arc<dyn NoteBackend> = match config {
        BackendConfig::Notion(c) => Arc::new(NotionBackend::from_config(name, c)?),
        BackendConfig::Teamly(c) => {
            Arc::new(TeamlyBackend::from_config(name, c, &app_config.data_dir)?)
        }
        BackendConfig::Yonote(c) => Arc::new(YonoteBackend::from_config(name, c)?),
        BackendConfig::Memory(_) => Arc::new(InMemoryBackend::new(name)),
    };
    Ok(backend)
}

/// Build every configured backend, preserving configuration order.
pub fn build_from_config(config: &AppConfig) -> Result<Vec<ConfiguredBackend>, BackendError> {
    let backends = config
        .backends
        .iter()
        .map(|entry| {
            let backend = build_backend(entry, config)?;
            info!(
                backend = %backend.name(),
                app = entry.app(),
                start_words = ?entry.start_words(),
                "Backend configured"
            );
            Ok(ConfiguredBackend {
                backend,
                delete_done_notes: entry.delete_done_notes(),
                start_words: entry.start_words().to_vec(),
            })
        })
        .collect::<Result<Vec<_>, BackendError>>()?;

    Ok(backends)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_in_configuration_order() {
        let config = AppConfig::from_toml(
            r#"
[[backends]]
app = "memory"
name = "inbox"
start_words = ["todo"]

[[backends]]
app = "notion"
token = "secret"
database_id = "db"
status_field_value = "st"
done_field_id = "Done"
delete_done_notes = true
"#,
        )
        .unwrap();

        let backends = build_from_config(&config).unwrap();
        assert_eq!(backends.len(), 2);
        assert_eq!(backends[0].backend.name(), "inbox");
        assert_eq!(backends[0].start_words, vec!["todo"]);
        assert!(!backends[0].delete_done_notes);
        assert_eq!(backends[1].backend.name(), "notion");
        assert!(backends[1].delete_done_notes);
        assert!(backends[1].start_words.is_empty());
    }

    #[test]
    fn empty_configuration_builds_nothing() {
        let backends = build_from_config(&AppConfig::default()).unwrap();
        assert!(backends.is_empty());
    }
}
