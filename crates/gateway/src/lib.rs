//! HTTP gateway for notebridge.
//!
//! Exposes health checks and the Alice voice-assistant webhook, which is an
//! alternate message source: dictated notes go straight into the router.
//!
//! Built on Axum.

pub mod alice;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use notebridge_config::AppConfig;
use notebridge_router::NotesRouter;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::info;

/// Dependencies shared by the request handlers.
pub struct AppContext {
    pub router: Arc<NotesRouter>,
    /// The only Alice user allowed to dictate notes. `None` rejects everyone.
    pub alice_user_id: Option<String>,
}

impl AppContext {
    pub fn new(router: Arc<NotesRouter>, alice_user_id: Option<String>) -> Self {
        Self {
            router,
            alice_user_id,
        }
    }

    pub fn from_config(router: Arc<NotesRouter>, config: &AppConfig) -> Self {
        Self::new(router, config.alice.user_id.clone())
    }
}

pub type SharedContext = Arc<AppContext>;

/// Build the Axum router with all gateway routes.
pub fn build_router(ctx: SharedContext) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/alice/message/", post(alice::message_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve the gateway until `shutdown` flips to true (or its sender is
/// dropped). In-flight requests are allowed to finish.
pub async fn start(
    config: &AppConfig,
    ctx: SharedContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(async move {
            // A dropped sender also means shutdown.
            let _ = shutdown.wait_for(|stop| *stop).await;
            info!("Gateway shutting down");
        })
        .await?;
    Ok(())
}

// --- Handlers ---

async fn root_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    source: String,
    backends: usize,
    started: bool,
}

async fn health_handler(State(ctx): State<SharedContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        source: ctx.router.source_name().to_string(),
        backends: ctx.router.registrations().len(),
        started: ctx.router.is_started(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use notebridge_core::{
        BackendError, CreateHandler, ListHandler, MessageSource, NoteBackend,
    };
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct NullSource;

    impl MessageSource for NullSource {
        fn name(&self) -> &str {
            "null"
        }
        fn register_create_handler(&self, _handler: CreateHandler) {}
        fn register_list_handler(&self, _handler: ListHandler) {}
    }

    #[derive(Default)]
    struct Inbox {
        fail: bool,
        notes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NoteBackend for Inbox {
        fn name(&self) -> &str {
            "inbox"
        }
        async fn create_note(&self, text: &str) -> Result<(), BackendError> {
            if self.fail {
                return Err(BackendError::Network("connection refused".into()));
            }
            self.notes.lock().unwrap().push(text.to_string());
            Ok(())
        }
        async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError> {
            Ok(vec![])
        }
    }

    fn app(inbox: Arc<Inbox>) -> Router {
        let mut router = NotesRouter::new(Arc::new(NullSource));
        router.register_backend(inbox, false, Vec::<String>::new());
        build_router(Arc::new(AppContext::new(
            Arc::new(router),
            Some("alice-user".into()),
        )))
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn alice_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/alice/message/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn utterance(user: &str, text: &str) -> Value {
        json!({
            "session": { "session_id": "s1", "user": { "user_id": user } },
            "request": { "original_utterance": text },
            "version": "1.0"
        })
    }

    #[tokio::test]
    async fn root_is_ok() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = call(app(Arc::default()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn health_reports_router() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(app(Arc::default()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["source"], "null");
        assert_eq!(body["backends"], 1);
        assert_eq!(body["started"], false);
    }

    #[tokio::test]
    async fn dictated_note_is_saved() {
        let inbox = Arc::new(Inbox::default());
        let (status, body) = call(
            app(inbox.clone()),
            alice_request(utterance("alice-user", "buy milk")),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["response"]["text"], alice::NOTE_SAVED);
        assert_eq!(body["response"]["end_session"], true);
        assert_eq!(body["version"], "1.0");
        assert_eq!(body["session"]["session_id"], "s1");
        assert_eq!(*inbox.notes.lock().unwrap(), vec!["buy milk".to_string()]);
    }

    #[tokio::test]
    async fn empty_utterance_gets_greeting() {
        let inbox = Arc::new(Inbox::default());
        let (status, body) =
            call(app(inbox.clone()), alice_request(utterance("alice-user", ""))).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["response"]["text"], alice::GREETING);
        assert_eq!(body["response"]["end_session"], false);
        assert!(inbox.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let inbox = Arc::new(Inbox::default());
        let (status, body) =
            call(app(inbox.clone()), alice_request(utterance("intruder", "hi"))).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "response": { "text": alice::SCENARIO_ERROR } }));
        assert!(inbox.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_body_is_scenario_error() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/alice/message/")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = call(app(Arc::default()), req).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["response"]["text"], alice::SCENARIO_ERROR);
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let inbox = Arc::new(Inbox {
            fail: true,
            ..Inbox::default()
        });
        let (status, body) =
            call(app(inbox), alice_request(utterance("alice-user", "buy milk"))).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["response"]["text"], alice::NOTE_NOT_SAVED);
    }

    #[tokio::test]
    async fn unconfigured_alice_user_rejects_everyone() {
        let router = Arc::new(NotesRouter::new(Arc::new(NullSource)));
        let app = build_router(Arc::new(AppContext::new(router, None)));
        let (_, body) = call(app, alice_request(json!({ "request": { "original_utterance": "x" } }))).await;
        assert_eq!(body["response"]["text"], alice::SCENARIO_ERROR);
    }
}
