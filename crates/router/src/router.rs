//! Notes router. Owns the routing table and bridges the message source
//! to every registered backend.
//!
//! Lifecycle: construct with a message source, register backends (this
//! needs `&mut self`), move the router into an `Arc`, then call
//! [`NotesRouter::start`]. Once shared, the routing table can no longer be
//! mutated, so concurrent callbacks read it without locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use notebridge_core::{BackendError, Error, MessageSource, NoteBackend, NoteId, Result};
use tracing::{debug, error, info, warn};

use crate::filter::select_targets;

/// One backend bound into the router.
#[derive(Clone)]
pub struct BackendRegistration {
    pub backend: Arc<dyn NoteBackend>,
    /// Whether periodic cleanup deletes this backend's completed notes
    pub delete_done_notes: bool,
    /// Filter triggers; empty = catch-all
    pub start_words: Vec<String>,
}

impl std::fmt::Debug for BackendRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistration")
            .field("backend", &self.backend.name())
            .field("delete_done_notes", &self.delete_done_notes)
            .field("start_words", &self.start_words)
            .finish()
    }
}

/// Outcome of one cleanup pass over a single backend.
#[derive(Debug, Clone)]
pub struct BackendCleanup {
    pub backend: String,
    pub deleted: usize,
    /// Notes whose deletion failed
    pub failed: Vec<(NoteId, BackendError)>,
    /// Set when the backend could not be processed at all
    pub error: Option<BackendError>,
}

impl BackendCleanup {
    fn new(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            deleted: 0,
            failed: Vec::new(),
            error: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.error.is_none()
    }
}

/// Outcome of a full cleanup cycle, one entry per opted-in backend.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub backends: Vec<BackendCleanup>,
}

impl CleanupReport {
    /// Total notes deleted across all backends.
    pub fn deleted(&self) -> usize {
        self.backends.iter().map(|b| b.deleted).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.backends.iter().all(BackendCleanup::is_clean)
    }
}

/// Routes inbound messages to note backends.
pub struct NotesRouter {
    source: Arc<dyn MessageSource>,
    registrations: Vec<BackendRegistration>,
    started: AtomicBool,
}

impl NotesRouter {
    /// Create an unstarted router with an empty routing table.
    pub fn new(source: Arc<dyn MessageSource>) -> Self {
        Self {
            source,
            registrations: Vec::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Append a backend to the routing table.
    ///
    /// No duplicate detection: registering the same backend twice yields two
    /// independent registrations that both receive traffic.
    pub fn register_backend<I, S>(
        &mut self,
        backend: Arc<dyn NoteBackend>,
        delete_done_notes: bool,
        start_words: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start_words: Vec<String> = start_words.into_iter().map(Into::into).collect();
        info!(
            backend = %backend.name(),
            delete_done_notes,
            start_words = ?start_words,
            "Registered note backend"
        );
        self.registrations.push(BackendRegistration {
            backend,
            delete_done_notes,
            start_words,
        });
        self
    }

    /// The routing table, in registration order.
    pub fn registrations(&self) -> &[BackendRegistration] {
        &self.registrations
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Wire the create and list callbacks into the message source.
    ///
    /// Idempotent: only the first call registers callbacks; later calls log a
    /// warning and return `false`. The callbacks hold a weak handle, so
    /// dropping the last `Arc<NotesRouter>` makes them fail with
    /// [`Error::Internal`] instead of keeping the router alive.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(source = %self.source.name(), "Notes router already started, ignoring");
            return false;
        }

        let weak = Arc::downgrade(self);
        self.source.register_create_handler(Arc::new(move |text: String| {
            let weak = weak.clone();
            async move {
                let router = upgrade(&weak)?;
                router.create_note(&text).await.map(|_| ())
            }
            .boxed()
        }));

        let weak = Arc::downgrade(self);
        self.source.register_list_handler(Arc::new(move || {
            let weak = weak.clone();
            async move {
                let router = upgrade(&weak)?;
                router.list_pending().await
            }
            .boxed()
        }));

        info!(
            source = %self.source.name(),
            backends = self.registrations.len(),
            "Notes router started"
        );
        true
    }

    /// Create a note for `text` on every backend the filter selects.
    ///
    /// Backends are called one after another in selection order. The first
    /// failure is returned immediately: notes already created on earlier
    /// backends stay, later backends are not called. Returns how many
    /// backends received the note (0 when the filter selected none).
    pub async fn create_note(&self, text: &str) -> Result<usize> {
        let targets = select_targets(text, &self.registrations);
        if targets.is_empty() {
            info!(text_len = text.len(), "No backend matched, note not created");
            return Ok(0);
        }

        debug!(targets = targets.len(), "Creating note");
        for registration in &targets {
            let name = registration.backend.name();
            registration.backend.create_note(text).await.map_err(|e| {
                error!(backend = %name, error = %e, "Failed to create note");
                Error::from(e)
            })?;
            debug!(backend = %name, "Note created");
        }

        info!(backends = targets.len(), "Note created");
        Ok(targets.len())
    }

    /// Build the pending-notes report.
    ///
    /// One block per backend in registration order: a line with the
    /// backend name followed by its pending titles, sorted within the block.
    pub async fn list_pending(&self) -> Result<String> {
        let mut lines = Vec::new();
        for registration in &self.registrations {
            let name = registration.backend.name();
            let mut titles = registration
                .backend
                .get_undone_note_titles()
                .await
                .map_err(|e| {
                    error!(backend = %name, error = %e, "Failed to list pending notes");
                    Error::from(e)
                })?;
            titles.sort();
            debug!(backend = %name, count = titles.len(), "Listed pending notes");
            lines.push(name.to_string());
            lines.extend(titles);
        }
        Ok(lines.join("\n"))
    }

    /// Delete completed notes on every backend registered with
    /// `delete_done_notes`.
    ///
    /// Failures are isolated: a backend whose listing fails is reported and
    /// skipped, and a failed delete does not stop the remaining deletes of
    /// the same backend. An unsupported delete stops that backend only.
    pub async fn cleanup_done_notes(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for registration in self.registrations.iter().filter(|r| r.delete_done_notes) {
            report.backends.push(cleanup_backend(registration.backend.as_ref()).await);
        }

        let deleted = report.deleted();
        if report.is_clean() {
            info!(deleted, "Cleanup cycle finished");
        } else {
            warn!(deleted, "Cleanup cycle finished with errors");
        }
        report
    }
}

fn upgrade(weak: &Weak<NotesRouter>) -> Result<Arc<NotesRouter>> {
    weak.upgrade()
        .ok_or_else(|| Error::Internal("notes router is no longer running".into()))
}

async fn cleanup_backend(backend: &dyn NoteBackend) -> BackendCleanup {
    let name = backend.name();
    let mut outcome = BackendCleanup::new(name);

    let ids = match backend.get_done_note_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(backend = %name, error = %e, "Failed to list done notes");
            outcome.error = Some(e);
            return outcome;
        }
    };

    for id in ids {
        match backend.delete_note(&id).await {
            Ok(()) => {
                debug!(backend = %name, note_id = %id, "Deleted done note");
                outcome.deleted += 1;
            }
            Err(e) if e.is_unsupported() => {
                warn!(backend = %name, error = %e, "Backend cannot delete notes");
                outcome.error = Some(e);
                break;
            }
            Err(e) => {
                warn!(backend = %name, note_id = %id, error = %e, "Failed to delete note");
                outcome.failed.push((id, e));
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notebridge_core::{CreateHandler, ListHandler};
    use std::collections::HashSet;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Backend that records every call into a log shared across backends.
    struct RecordingBackend {
        name: String,
        log: CallLog,
        pending: Vec<String>,
        done: Mutex<Vec<NoteId>>,
        fail_create: bool,
        fail_list_done: bool,
        fail_delete: HashSet<String>,
    }

    impl RecordingBackend {
        fn new(name: &str, log: &CallLog) -> Self {
            Self {
                name: name.into(),
                log: log.clone(),
                pending: vec![],
                done: Mutex::new(vec![]),
                fail_create: false,
                fail_list_done: false,
                fail_delete: HashSet::new(),
            }
        }

        fn with_pending(mut self, titles: &[&str]) -> Self {
            self.pending = titles.iter().map(|t| t.to_string()).collect();
            self
        }

        fn with_done(self, ids: &[&str]) -> Self {
            *self.done.lock().unwrap() = ids.iter().map(|i| NoteId::from(*i)).collect();
            self
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl NoteBackend for RecordingBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn create_note(&self, text: &str) -> std::result::Result<(), BackendError> {
            self.record(format!("{}:create:start:{text}", self.name));
            tokio::task::yield_now().await;
            self.record(format!("{}:create:end", self.name));
            if self.fail_create {
                return Err(BackendError::Network("connection reset".into()));
            }
            Ok(())
        }

        async fn get_undone_note_titles(&self) -> std::result::Result<Vec<String>, BackendError> {
            self.record(format!("{}:list_undone", self.name));
            Ok(self.pending.clone())
        }

        async fn get_done_note_ids(&self) -> std::result::Result<Vec<NoteId>, BackendError> {
            self.record(format!("{}:list_done", self.name));
            if self.fail_list_done {
                return Err(BackendError::Api {
                    status_code: 500,
                    message: "boom".into(),
                });
            }
            Ok(self.done.lock().unwrap().clone())
        }

        async fn delete_note(&self, id: &NoteId) -> std::result::Result<(), BackendError> {
            self.record(format!("{}:delete:{id}", self.name));
            if self.fail_delete.contains(&id.0) {
                return Err(BackendError::NotFound(id.0.clone()));
            }
            self.done.lock().unwrap().retain(|d| d != id);
            Ok(())
        }
    }

    /// Backend with only the mandatory capabilities.
    struct CreateOnlyBackend;

    #[async_trait]
    impl NoteBackend for CreateOnlyBackend {
        fn name(&self) -> &str {
            "create-only"
        }
        async fn create_note(&self, _text: &str) -> std::result::Result<(), BackendError> {
            Ok(())
        }
        async fn get_undone_note_titles(&self) -> std::result::Result<Vec<String>, BackendError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct TestSource {
        create: Mutex<Vec<CreateHandler>>,
        list: Mutex<Vec<ListHandler>>,
    }

    impl TestSource {
        fn create_handler(&self) -> CreateHandler {
            self.create.lock().unwrap().last().cloned().unwrap()
        }
        fn list_handler(&self) -> ListHandler {
            self.list.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl MessageSource for TestSource {
        fn name(&self) -> &str {
            "test"
        }
        fn register_create_handler(&self, handler: CreateHandler) {
            self.create.lock().unwrap().push(handler);
        }
        fn register_list_handler(&self, handler: ListHandler) {
            self.list.lock().unwrap().push(handler);
        }
    }

    fn new_log() -> CallLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn registration_preserves_order_and_allows_duplicates() {
        let log = new_log();
        let a: Arc<dyn NoteBackend> = Arc::new(RecordingBackend::new("a", &log));
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router
            .register_backend(a.clone(), true, Vec::<String>::new())
            .register_backend(Arc::new(RecordingBackend::new("b", &log)), false, ["todo"])
            .register_backend(a, false, ["x"]);

        let names: Vec<&str> = router
            .registrations()
            .iter()
            .map(|r| r.backend.name())
            .collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert!(router.registrations()[0].delete_done_notes);
        assert_eq!(router.registrations()[1].start_words, vec!["todo".to_string()]);
        assert!(!router.is_started());
    }

    #[tokio::test]
    async fn fan_out_is_sequential_in_registration_order() {
        let log = new_log();
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        for name in ["a", "b", "c"] {
            router.register_backend(
                Arc::new(RecordingBackend::new(name, &log)),
                false,
                Vec::<String>::new(),
            );
        }

        let created = router.create_note("buy milk").await.unwrap();
        assert_eq!(created, 3);
        assert_eq!(
            entries(&log),
            vec![
                "a:create:start:buy milk",
                "a:create:end",
                "b:create:start:buy milk",
                "b:create:end",
                "c:create:start:buy milk",
                "c:create:end",
            ]
        );
    }

    #[tokio::test]
    async fn partial_fan_out_failure_propagates_without_rollback() {
        let log = new_log();
        let mut failing = RecordingBackend::new("b", &log);
        failing.fail_create = true;

        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router
            .register_backend(Arc::new(RecordingBackend::new("a", &log)), false, Vec::<String>::new())
            .register_backend(Arc::new(failing), false, Vec::<String>::new())
            .register_backend(Arc::new(RecordingBackend::new("c", &log)), false, Vec::<String>::new());

        let err = router.create_note("x").await.unwrap_err();
        assert!(matches!(err, Error::Backend(BackendError::Network(_))));

        let log = entries(&log);
        assert!(log.contains(&"a:create:end".to_string()));
        assert!(log.contains(&"b:create:end".to_string()));
        assert!(!log.iter().any(|e| e.starts_with("c:")));
    }

    #[tokio::test]
    async fn unmatched_message_without_catch_all_is_dropped() {
        let log = new_log();
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router.register_backend(Arc::new(RecordingBackend::new("a", &log)), false, ["todo"]);

        assert_eq!(router.create_note("hello").await.unwrap(), 0);
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn end_to_end_filtering_through_router() {
        let log = new_log();
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router
            .register_backend(Arc::new(RecordingBackend::new("x", &log)), true, Vec::<String>::new())
            .register_backend(Arc::new(RecordingBackend::new("y", &log)), false, ["note:"]);

        router.create_note("note: buy milk").await.unwrap();
        router.create_note("hello").await.unwrap();

        assert_eq!(
            entries(&log),
            vec![
                "y:create:start:note: buy milk",
                "y:create:end",
                "x:create:start:hello",
                "x:create:end",
            ]
        );
    }

    #[tokio::test]
    async fn list_pending_keeps_backend_order_and_sorts_titles() {
        let log = new_log();
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router
            .register_backend(
                Arc::new(RecordingBackend::new("zeta", &log).with_pending(&["[new] b", "[new] a"])),
                false,
                Vec::<String>::new(),
            )
            .register_backend(
                Arc::new(RecordingBackend::new("alpha", &log).with_pending(&["[wip] z", "[new] c"])),
                false,
                Vec::<String>::new(),
            );

        let report = router.list_pending().await.unwrap();
        assert_eq!(report, "zeta\n[new] a\n[new] b\nalpha\n[new] c\n[wip] z");
    }

    #[tokio::test]
    async fn list_pending_with_empty_backend_still_names_it() {
        let log = new_log();
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router.register_backend(Arc::new(RecordingBackend::new("empty", &log)), false, Vec::<String>::new());
        assert_eq!(router.list_pending().await.unwrap(), "empty");
    }

    #[tokio::test]
    async fn cleanup_skips_backends_not_opted_in() {
        let log = new_log();
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router
            .register_backend(
                Arc::new(RecordingBackend::new("keep", &log).with_done(&["k1"])),
                false,
                Vec::<String>::new(),
            )
            .register_backend(
                Arc::new(RecordingBackend::new("purge", &log).with_done(&["p1", "p2"])),
                true,
                Vec::<String>::new(),
            );

        let report = router.cleanup_done_notes().await;
        assert_eq!(report.deleted(), 2);
        assert!(report.is_clean());
        assert_eq!(report.backends.len(), 1);
        assert_eq!(report.backends[0].backend, "purge");

        let log = entries(&log);
        assert!(!log.iter().any(|e| e.starts_with("keep:")));
        assert_eq!(
            log,
            vec!["purge:list_done", "purge:delete:p1", "purge:delete:p2"]
        );
    }

    #[tokio::test]
    async fn cleanup_twice_deletes_nothing_the_second_time() {
        let log = new_log();
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router.register_backend(
            Arc::new(RecordingBackend::new("a", &log).with_done(&["1", "2"])),
            true,
            Vec::<String>::new(),
        );

        assert_eq!(router.cleanup_done_notes().await.deleted(), 2);
        log.lock().unwrap().clear();

        let second = router.cleanup_done_notes().await;
        assert_eq!(second.deleted(), 0);
        assert!(!entries(&log).iter().any(|e| e.contains(":delete:")));
    }

    #[tokio::test]
    async fn cleanup_failure_is_isolated_per_backend() {
        let log = new_log();
        let mut broken = RecordingBackend::new("broken", &log);
        broken.fail_list_done = true;

        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router
            .register_backend(Arc::new(broken), true, Vec::<String>::new())
            .register_backend(
                Arc::new(RecordingBackend::new("ok", &log).with_done(&["1"])),
                true,
                Vec::<String>::new(),
            );

        let report = router.cleanup_done_notes().await;
        assert!(!report.is_clean());
        assert!(report.backends[0].error.is_some());
        assert_eq!(report.backends[1].deleted, 1);
    }

    #[tokio::test]
    async fn failed_delete_does_not_stop_remaining_deletes() {
        let log = new_log();
        let mut flaky = RecordingBackend::new("flaky", &log).with_done(&["1", "2", "3"]);
        flaky.fail_delete.insert("2".into());

        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router.register_backend(Arc::new(flaky), true, Vec::<String>::new());

        let report = router.cleanup_done_notes().await;
        let outcome = &report.backends[0];
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, NoteId::from("2"));
        assert!(entries(&log).contains(&"flaky:delete:3".to_string()));
    }

    #[tokio::test]
    async fn cleanup_reports_unsupported_capability() {
        let mut router = NotesRouter::new(Arc::new(TestSource::default()));
        router.register_backend(Arc::new(CreateOnlyBackend), true, Vec::<String>::new());

        let report = router.cleanup_done_notes().await;
        let error = report.backends[0].error.as_ref().unwrap();
        assert!(error.is_unsupported());
    }

    #[tokio::test]
    async fn start_wires_callbacks_once() {
        let log = new_log();
        let source = Arc::new(TestSource::default());
        let mut router = NotesRouter::new(source.clone());
        router.register_backend(
            Arc::new(RecordingBackend::new("a", &log).with_pending(&["[new] one"])),
            false,
            Vec::<String>::new(),
        );
        let router = Arc::new(router);

        assert!(router.start());
        assert!(!router.start());
        assert!(router.is_started());
        assert_eq!(source.create.lock().unwrap().len(), 1);
        assert_eq!(source.list.lock().unwrap().len(), 1);

        (source.create_handler())("via callback".into()).await.unwrap();
        assert_eq!(entries(&log)[0], "a:create:start:via callback");

        let listing = (source.list_handler())().await.unwrap();
        assert_eq!(listing, "a\n[new] one");
    }

    #[tokio::test]
    async fn callbacks_fail_after_router_is_dropped() {
        let source = Arc::new(TestSource::default());
        let router = Arc::new(NotesRouter::new(source.clone()));
        router.start();
        drop(router);

        let err = (source.create_handler())("late".into()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
