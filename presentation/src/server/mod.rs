//! HTTP transport
//!
//! | Route | |
//! |-------|---|
//! | `POST /api/council/run-round` | one round, streamed as Server-Sent Events |
//! | `POST /api/council/sessions` | a whole session to consensus, streamed |
//! | `GET /api/council/history` | concluded sessions |
//! | `GET /api/council/sessions/:id` | one session with its drafts and evaluations |
//!
//! Each SSE `data:` line is one JSON council event with a `type` tag. The run
//! is spawned detached from the response, so a client that disconnects stops
//! receiving events while the round still completes and persists.

pub mod dto;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use council_application::{
    ChannelEventSink, CouncilError, CouncilEvent, GetHistoryUseCase, LlmGateway,
    SessionController, SessionRepository,
};
use council_domain::SessionId;
use dto::{ErrorBody, RunRoundBody, RunSessionBody};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared state of the HTTP server
pub struct AppState<G: LlmGateway + 'static, R: SessionRepository + 'static> {
    controller: Arc<SessionController<G, R>>,
    history: GetHistoryUseCase<R>,
    /// Cancelled on shutdown; every spawned run holds a child token
    shutdown: CancellationToken,
}

impl<G: LlmGateway + 'static, R: SessionRepository + 'static> AppState<G, R> {
    pub fn new(
        controller: Arc<SessionController<G, R>>,
        repository: Arc<R>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            history: GetHistoryUseCase::new(repository),
            shutdown,
        }
    }
}

type SharedState<G, R> = Arc<AppState<G, R>>;

pub fn router<G: LlmGateway + 'static, R: SessionRepository + 'static>(
    state: SharedState<G, R>,
) -> Router {
    Router::new()
        .route("/api/council/run-round", post(run_round::<G, R>))
        .route("/api/council/sessions", post(run_session::<G, R>))
        .route("/api/council/sessions/:id", get(session_detail::<G, R>))
        .route("/api/council/history", get(history::<G, R>))
        .with_state(state)
}

/// Serve until the state's shutdown token is cancelled
pub async fn serve<G: LlmGateway + 'static, R: SessionRepository + 'static>(
    state: SharedState<G, R>,
    bind: &str,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("Council server listening on http://{}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
        .into_response()
}

fn council_error_response(e: CouncilError) -> Response {
    let status = match &e {
        CouncilError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        CouncilError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CouncilError::Storage(_) | CouncilError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

fn event_stream(
    rx: UnboundedReceiver<CouncilEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let json = serde_json::to_string(&event).unwrap_or_default();
        Some((Ok(Event::default().data(json)), rx))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn run_round<G: LlmGateway + 'static, R: SessionRepository + 'static>(
    State(state): State<SharedState<G, R>>,
    Json(body): Json<RunRoundBody>,
) -> Response {
    if body.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "query must not be empty");
    }

    let (sink, rx) = ChannelEventSink::channel();
    let controller = Arc::clone(&state.controller);
    let cancel = state.shutdown.child_token();
    tokio::spawn(async move {
        if let Err(e) = controller
            .run_round(body.into(), Arc::new(sink), &cancel)
            .await
        {
            debug!("Streamed round ended with error: {}", e);
        }
    });

    event_stream(rx).into_response()
}

async fn run_session<G: LlmGateway + 'static, R: SessionRepository + 'static>(
    State(state): State<SharedState<G, R>>,
    Json(body): Json<RunSessionBody>,
) -> Response {
    if body.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "query must not be empty");
    }

    let (sink, rx) = ChannelEventSink::channel();
    let controller = Arc::clone(&state.controller);
    let cancel = state.shutdown.child_token();
    tokio::spawn(async move {
        let session_id = body.session_id.map(SessionId::new);
        if let Err(e) = controller
            .run_session(&body.query, session_id, Arc::new(sink), &cancel)
            .await
        {
            debug!("Streamed session ended with error: {}", e);
        }
    });

    event_stream(rx).into_response()
}

async fn history<G: LlmGateway + 'static, R: SessionRepository + 'static>(
    State(state): State<SharedState<G, R>>,
) -> Response {
    match state.history.execute().await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => council_error_response(e),
    }
}

async fn session_detail<G: LlmGateway + 'static, R: SessionRepository + 'static>(
    State(state): State<SharedState<G, R>>,
    Path(id): Path<i64>,
) -> Response {
    match state.history.session_detail(SessionId::new(id)).await {
        Ok(detail) => Json(detail).into_response(),
        Err(e) => council_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use council_application::{CompletionRequest, CouncilConfig, GatewayError};
    use council_infrastructure::InMemorySessionRepository;

    /// Workers echo; the judge always approves
    struct ApprovingGateway;

    #[async_trait]
    impl LlmGateway for ApprovingGateway {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
            if request.json_response {
                Ok(r#"{"synthesis":"Go hybrid.","critique":"","score":96,"stop":false}"#
                    .to_string())
            } else {
                Ok("A draft.".to_string())
            }
        }
    }

    struct TestServer {
        base: String,
        shutdown: CancellationToken,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    async fn start() -> TestServer {
        let repository = Arc::new(InMemorySessionRepository::new());
        let controller = Arc::new(SessionController::new(
            Arc::new(ApprovingGateway),
            Arc::clone(&repository),
            CouncilConfig::default(),
        ));
        let shutdown = CancellationToken::new();
        let state = Arc::new(AppState::new(controller, repository, shutdown.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, router(state))
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .unwrap();
        });

        TestServer { base, shutdown }
    }

    fn events(body: &str) -> Vec<serde_json::Value> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_before_streaming() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/council/run-round", server.base))
            .json(&serde_json::json!({"query": "   "}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "query must not be empty");
    }

    #[tokio::test]
    async fn test_run_round_streams_events_in_order() {
        let server = start().await;
        let body = reqwest::Client::new()
            .post(format!("{}/api/council/run-round", server.base))
            .json(&serde_json::json!({"query": "Is remote work better?"}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        let events = events(&body);
        let types: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
        assert_eq!(types.first(), Some(&"session_created"));
        assert_eq!(types.last(), Some(&"judge_result"));
        assert_eq!(types.iter().filter(|t| **t == "worker_complete").count(), 3);
        let last = events.last().unwrap();
        assert_eq!(last["evaluation"]["score"], 96);
        assert_eq!(last["decision"]["decision"], "finalize");
    }

    #[tokio::test]
    async fn test_session_run_then_history_and_detail() {
        let server = start().await;
        let client = reqwest::Client::new();

        let body = client
            .post(format!("{}/api/council/sessions", server.base))
            .json(&serde_json::json!({"query": "Is remote work better?"}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let events = events(&body);
        assert_eq!(events.last().unwrap()["type"], "consensus");
        let id = events.last().unwrap()["session_id"].as_i64().unwrap();

        let history: serde_json::Value = client
            .get(format!("{}/api/council/history", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history[0]["final_synthesis"], "Go hybrid.");
        assert_eq!(history[0]["score"], 96);

        let detail: serde_json::Value = client
            .get(format!("{}/api/council/sessions/{}", server.base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(detail["session"]["status"], "consensus");
        assert_eq!(detail["drafts"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let server = start().await;
        let response = reqwest::get(format!("{}/api/council/sessions/999", server.base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
