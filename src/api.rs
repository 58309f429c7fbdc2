//! REST endpoints for driving conversations over HTTP.
//!
//! - `POST /api/threads` starts a thread and returns its id.
//! - `POST /api/threads/{id}/messages` runs one turn.
//! - `GET /api/threads/{id}` returns the stored conversation.
//! - `DELETE /api/threads/{id}` forgets it.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::Error;
use crate::verification::VerificationFlow;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub flow: Arc<VerificationFlow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewThread {
    pub thread_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PostMessage {
    pub text: String,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Map a failed turn to a status: oracle outages are 503 (try again),
/// everything else is 500.
fn error_response(err: &Error) -> Response {
    let status = if err.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(serde_json::json!({
            "error": err.user_message(),
            "retryable": err.is_retryable(),
        })),
    )
        .into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/threads
async fn create_thread() -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(NewThread {
            thread_id: Uuid::new_v4(),
        }),
    )
}

/// POST /api/threads/{id}/messages
async fn post_message(
    State(state): State<ApiState>,
    Path(thread_id): Path<Uuid>,
    Json(body): Json<PostMessage>,
) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Message text is empty");
    }

    match state.flow.handle_message(thread_id, text).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/threads/{id}
async fn get_thread(State(state): State<ApiState>, Path(thread_id): Path<Uuid>) -> Response {
    match state.flow.conversation(thread_id).await {
        Ok(Some(checkpoint)) => Json(checkpoint).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Thread not found"),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/threads/{id}
async fn delete_thread(State(state): State<ApiState>, Path(thread_id): Path<Uuid>) -> Response {
    match state.flow.reset(thread_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Thread not found"),
        Err(e) => error_response(&e),
    }
}

/// Build the API router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/threads", post(create_thread))
        .route("/api/threads/{id}/messages", post(post_message))
        .route("/api/threads/{id}", get(get_thread).delete(delete_thread))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::conversation::ConversationState;
    use crate::error::{LlmError, OracleError, OracleKind};
    use crate::responder::{SpecialistResponder, TemplateResponder};
    use crate::store::{LibSqlBackend, SeedData};
    use crate::verification::{
        KeywordClassifier, QueryClassification, QueryClassifier, RegexEmailExtractor,
    };

    struct OutageClassifier;

    #[async_trait]
    impl QueryClassifier for OutageClassifier {
        async fn classify(&self, _: &str) -> Result<QueryClassification, OracleError> {
            Err(OracleError::Call {
                oracle: OracleKind::Classifier,
                source: LlmError::RequestFailed {
                    provider: "test".into(),
                    reason: "503".into(),
                },
            })
        }
    }

    struct Quiet;

    #[async_trait]
    impl SpecialistResponder for Quiet {
        async fn respond(&self, _: &ConversationState) -> Result<String, Error> {
            Ok("ok".into())
        }
    }

    async fn app_with(
        classifier: Arc<dyn QueryClassifier>,
        responder: Option<Arc<dyn SpecialistResponder>>,
    ) -> Router {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        SeedData::demo().load_into(&db).await.unwrap();
        let responder = responder.unwrap_or_else(|| {
            Arc::new(TemplateResponder::new(db.clone())) as Arc<dyn SpecialistResponder>
        });
        let mut config = crate::config::FlowConfig::default();
        config.retry.max_retries = 0;
        let flow = VerificationFlow::new(
            db.clone(),
            db,
            classifier,
            Arc::new(RegexEmailExtractor::new().unwrap()),
            responder,
        )
        .with_config(config);
        api_routes(ApiState {
            flow: Arc::new(flow),
        })
    }

    async fn app() -> Router {
        app_with(Arc::new(KeywordClassifier::default_rules().unwrap()), None).await
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn create_thread_returns_id() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/threads")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(Uuid::parse_str(body["thread_id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn suspend_and_resume_over_http() {
        let app = app().await;
        let id = Uuid::new_v4();
        let uri = format!("/api/threads/{id}/messages");

        let (status, body) = send(
            &app,
            post_json(&uri, serde_json::json!({"text": "What's the status of my last order?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "awaiting_input");
        assert_eq!(body["prompt"], "Please provide your email:");

        let (_, thread) = send(&app, get_req(&format!("/api/threads/{id}"))).await;
        assert_eq!(thread["pending"], "collect");

        let (status, body) = send(
            &app,
            post_json(&uri, serde_json::json!({"text": "sarah.chen@gmail.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "responded");
        assert_eq!(body["customer_id"], "CUST-001");
        assert_eq!(body["messages"][0], "✓ Verified! Welcome back, Sarah Chen.");

        let (_, thread) = send(&app, get_req(&format!("/api/threads/{id}"))).await;
        assert!(thread["pending"].is_null());
        assert_eq!(thread["state"]["customer_id"], "CUST-001");
    }

    #[tokio::test]
    async fn oracle_outage_is_503() {
        let app = app_with(Arc::new(OutageClassifier), Some(Arc::new(Quiet))).await;
        let (status, body) = send(
            &app,
            post_json(
                &format!("/api/threads/{}/messages", Uuid::new_v4()),
                serde_json::json!({"text": "Where is my order?"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retryable"], true);
        assert_eq!(body["error"], crate::error::TRY_AGAIN_MESSAGE);
    }

    #[tokio::test]
    async fn empty_text_and_unknown_thread() {
        let app = app().await;
        let id = Uuid::new_v4();
        let (status, _) = send(
            &app,
            post_json(&format!("/api/threads/{id}/messages"), serde_json::json!({"text": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get_req(&format!("/api/threads/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get_req("/api/threads/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_thread() {
        let app = app().await;
        let id = Uuid::new_v4();
        send(
            &app,
            post_json(&format!("/api/threads/{id}/messages"), serde_json::json!({"text": "hi"})),
        )
        .await;

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/threads/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
