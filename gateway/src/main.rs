mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{ChatRequest, ChatResponse, HealthResponse};
use kycdesk_core::config::{AppConfig, LogFormat, LoggingConfig};
use kycdesk_core::{build_model, HttpAdminApi, Orchestrator, Registry};

// Model client, backend client and catalog, all immutable after start-up
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match config.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    init_logging(&config.logging);

    info!("KYC Desk Gateway Initializing...");

    // The Brain
    let model = build_model(&config.model).context("failed to initialize model client")?;
    match model.probe().await {
        Ok(msg) => info!(model = model.model_name(), "Brain Status: {}", msg),
        Err(e) => warn!(model = model.model_name(), "Brain is configured but unresponsive: {e:#}"),
    }

    // The Menu
    let tools = Arc::new(Registry::load().context("failed to load tool catalog")?);
    info!("Loaded {} tools available for the Brain.", tools.len());

    // The Backend
    let backend = HttpAdminApi::new(&config.backend).context("failed to build backend client")?;
    info!(base_url = %config.backend.base_url, "Admin backend configured");

    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(model, Arc::new(backend), tools)),
    };
    let app = router(state, &config.server.cors_origin)?;

    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    info!("Gateway listening on {}...", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("server terminated unexpectedly")?;

    info!("Gateway stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
}

fn router(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS origin '{cors_origin}'"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let chat = Router::new().route("/chat", post(chat)).layer(cors);

    Ok(Router::new()
        .route("/health", get(health_check))
        .merge(chat)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

// --- HANDLERS ---

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.orchestrator.model_name().to_string(),
        tools: state.orchestrator.tools().len(),
    })
}

// The Orchestrator Handler
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ChatResponse>) {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!("Rejected chat request: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(ChatResponse {
                    response: format!("An error occurred: {}", rejection.body_text()),
                    history: None,
                }),
            );
        }
    };
    info!(history_turns = payload.history.len(), "Chat request: {}", payload.query);

    match state.orchestrator.chat(&payload.query, payload.history).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ChatResponse { response: outcome.response, history: Some(outcome.history) }),
        ),
        Err(e) => {
            error!("An unexpected error occurred in the chat logic: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse { response: format!("An error occurred: {e:#}"), history: None }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use kycdesk_core::backend::{AdminApi, BackendError};
    use kycdesk_core::conversation::{FunctionCall, Part, Turn};
    use kycdesk_core::{ModelReply, ModelService, ToolRecord};
    use serde_json::{json, Map, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct ScriptedModel(Mutex<VecDeque<Turn>>);

    #[async_trait]
    impl ModelService for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn probe(&self) -> Result<String> {
            Ok("System Online".into())
        }
        async fn generate(&self, _tools: &[ToolRecord], _contents: &[Turn]) -> Result<ModelReply> {
            let turn = self.0.lock().unwrap().pop_front();
            turn.map(ModelReply::new).context("model unavailable")
        }
    }

    struct StatsBackend;

    #[async_trait]
    impl AdminApi for StatsBackend {
        async fn search_customer(&self, _: &str) -> Result<Option<Value>, BackendError> {
            Ok(None)
        }
        async fn dashboard_stats(&self) -> Result<Option<Value>, BackendError> {
            Ok(Some(json!({"total": 12, "pending": 5, "verified": 6, "rejected": 1})))
        }
        async fn list_by_kyc(&self, _: &str) -> Result<Option<Value>, BackendError> {
            Ok(None)
        }
        async fn registrations_on_date(
            &self,
            _: chrono::NaiveDate,
        ) -> Result<Option<Value>, BackendError> {
            Ok(None)
        }
        async fn accounts_created_on_date(
            &self,
            _: chrono::NaiveDate,
        ) -> Result<Option<Value>, BackendError> {
            Ok(None)
        }
    }

    fn model_turn(parts: Vec<Part>) -> Turn {
        Turn::new("model", parts)
    }

    fn app(replies: Vec<Turn>) -> Router {
        let state = AppState {
            orchestrator: Arc::new(Orchestrator::new(
                Arc::new(ScriptedModel(Mutex::new(replies.into()))),
                Arc::new(StatsBackend),
                Arc::new(Registry::load().unwrap()),
            )),
        };
        router(state, "http://localhost:8080").unwrap()
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_runs_tool_and_returns_history() {
        let app = app(vec![
            model_turn(vec![Part::FunctionCall(FunctionCall {
                name: "get_dashboard_statistics".into(),
                args: Map::new(),
            })]),
            model_turn(vec![Part::Text("12 applications, 5 pending.".into())]),
        ]);

        let response = app.oneshot(post_chat(json!({"query": "dashboard?"}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["response"], "12 applications, 5 pending.");
        assert_eq!(
            body["history"],
            json!([
                {"role": "user", "parts": [{"text": "dashboard?"}]},
                {"role": "model", "parts": [{"function_call": {"name": "get_dashboard_statistics", "args": {}}}]},
                {"role": "function", "parts": [{"function_response": {
                    "name": "get_dashboard_statistics",
                    "response": {"result": "Stats: Total: 12, Pending: 5, Verified: 6, Rejected: 1.", "data": null}
                }}]},
                {"role": "model", "parts": [{"text": "12 applications, 5 pending."}]}
            ])
        );
    }

    #[tokio::test]
    async fn replayed_history_is_cleaned() {
        let app = app(vec![model_turn(vec![Part::Text("Hello again.".into())])]);
        let request = post_chat(json!({
            "query": "hi",
            "history": [null, {"role": "user", "parts": [{"text": ""}]}, {"parts": [{"text": "Earlier answer"}]}]
        }));

        let body = json_body(app.oneshot(request).await.unwrap()).await;
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], json!({"role": "model", "parts": [{"text": "Earlier answer"}]}));
    }

    #[tokio::test]
    async fn internal_failure_is_500_without_history() {
        let app = app(vec![]);
        let response = app.oneshot(post_chat(json!({"query": "hi", "history": []}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["response"], "An error occurred: model unavailable");
        assert!(body.get("history").is_none());
    }

    #[tokio::test]
    async fn request_without_query_gets_json_error() {
        let response = app(vec![]).oneshot(post_chat(json!({"history": []}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert!(body["response"].as_str().unwrap().starts_with("An error occurred: "));
        assert!(body.get("history").is_none());
    }

    #[tokio::test]
    async fn unparsable_body_gets_json_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(vec![]).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["response"].is_string());
    }

    #[tokio::test]
    async fn health_reports_catalog_size() {
        let response = app(vec![])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body, json!({"status": "ok", "model": "scripted", "tools": 8}));
    }

    #[tokio::test]
    async fn preflight_allows_configured_origin_only() {
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/chat")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app(vec![]).oneshot(preflight("http://localhost:8080")).await.unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:8080"
        );

        let denied = app(vec![]).oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}
