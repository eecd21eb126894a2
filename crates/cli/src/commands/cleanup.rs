//! `notebridge cleanup`: run one cleanup cycle and print the report.

use std::sync::Arc;

use notebridge_channels::LocalSource;
use notebridge_config::AppConfig;
use notebridge_router::CleanupReport;

use super::bootstrap::start_router;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let router = start_router(&config, Arc::new(LocalSource::new()))?;
    let report = router.cleanup_done_notes().await;
    print!("{}", render(&report));

    if report.is_clean() {
        Ok(())
    } else {
        Err("cleanup finished with errors".into())
    }
}

/// Human-readable report, one block per opted-in backend.
pub fn render(report: &CleanupReport) -> String {
    if report.backends.is_empty() {
        return "No backend has delete_done_notes enabled\n".to_string();
    }

    let mut out = String::new();
    for backend in &report.backends {
        out.push_str(&format!("{}: deleted {}\n", backend.backend, backend.deleted));
        if let Some(e) = &backend.error {
            out.push_str(&format!("  error: {e}\n"));
        }
        for (id, e) in &backend.failed {
            out.push_str(&format!("  failed {id}: {e}\n"));
        }
    }
    out.push_str(&format!("Total deleted: {}\n", report.deleted()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notebridge_core::BackendError;
    use notebridge_router::BackendCleanup;

    #[test]
    fn empty_report_explains_why() {
        assert!(render(&CleanupReport::default()).contains("delete_done_notes"));
    }

    #[test]
    fn report_lists_every_backend() {
        let report = CleanupReport {
            backends: vec![
                BackendCleanup {
                    backend: "work".into(),
                    deleted: 2,
                    failed: vec![],
                    error: None,
                },
                BackendCleanup {
                    backend: "wiki".into(),
                    deleted: 0,
                    failed: vec![],
                    error: Some(BackendError::unsupported("wiki", "delete_note")),
                },
            ],
        };
        let text = render(&report);
        assert!(text.contains("work: deleted 2"));
        assert!(text.contains("wiki: deleted 0"));
        assert!(text.contains("not supported"));
        assert!(text.ends_with("Total deleted: 2\n"));
    }
}
