use crate::config::Settings;
use crate::report;
use crate::server_security;
use anyhow::Result;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use simrec_engine::{Engine, StoreHandle};
use simrec_ingest::Fetcher;
use simrec_protocol::{
    serialize_json, ErrorEnvelope, ErrorPhase, RecommendRequest, RecommendResponse,
    TitlesResponse, PROTOCOL_SCHEMA_VERSION,
};
use simrec_store::{load_store, reload_store, LoadConfig};
use std::sync::Arc;

pub(crate) struct HttpState {
    engine: Engine,
    fetcher: Fetcher,
    load: LoadConfig,
    reload_lock: tokio::sync::Mutex<()>,
}

impl HttpState {
    pub(crate) fn new(engine: Engine, fetcher: Fetcher, load: LoadConfig) -> Self {
        Self {
            engine,
            fetcher,
            load,
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }
}

pub(crate) fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/titles", get(titles))
        .route("/recommend", post(recommend))
        .route("/reload", post(reload))
        .with_state(state)
}

/// Loads the store (startup barrier) and serves until the process is stopped.
pub(crate) async fn serve_http(bind: &str, public: bool, settings: Settings) -> Result<()> {
    server_security::resolve_guarded_bind_addrs(bind, public).await?;

    let fetcher = Fetcher::new(settings.fetch.clone())?;
    let store = load_store(&fetcher, &settings.load)
        .await
        .map_err(crate::describe_load_error)?;
    let engine = Engine::new(StoreHandle::new(store), settings.top_k);
    let state = Arc::new(HttpState::new(engine, fetcher, settings.load));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    crate::print_stdout(&format!("Serving recommendations: {base_url}/recommend"))?;
    crate::print_stdout(&format!(
        "Try: curl -X POST {base_url}/recommend -d '{{\"title\":\"...\",\"k\":5}}'"
    ))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<Arc<HttpState>>) -> Response {
    let store = state.engine.handle().snapshot();
    json_response(StatusCode::OK, &report::store_summary(&store))
}

async fn titles(State(state): State<Arc<HttpState>>) -> Response {
    let store = state.engine.handle().snapshot();
    let response = TitlesResponse {
        schema_version: PROTOCOL_SCHEMA_VERSION,
        titles: store.titles().map(str::to_string).collect(),
    };
    json_response(StatusCode::OK, &response)
}

async fn recommend(State(state): State<Arc<HttpState>>, body: String) -> Response {
    let default_k = state.engine.default_k();
    let request: RecommendRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            let error = ErrorEnvelope {
                code: "invalid_request".to_string(),
                message: format!("Invalid request body: {err}"),
                phase: ErrorPhase::Request,
                details: None,
                hint: Some(r#"Send JSON like {"title": "Avatar", "k": 5}."#.to_string()),
            };
            return json_response(
                StatusCode::BAD_REQUEST,
                &RecommendResponse::error(String::new(), default_k, error),
            );
        }
    };

    let k = request.k.unwrap_or(default_k);
    match state.engine.recommend(&request.title, Some(k)) {
        Ok(recs) => json_response(
            StatusCode::OK,
            &report::recommend_response(&request.title, k, &recs),
        ),
        Err(err) => {
            let status = if err.is_user_error() {
                StatusCode::NOT_FOUND
            } else {
                log::error!("Recommendation for '{}' failed: {err}", request.title);
                StatusCode::UNPROCESSABLE_ENTITY
            };
            json_response(
                status,
                &RecommendResponse::error(request.title, k, report::request_error(&err)),
            )
        }
    }
}

async fn reload(State(state): State<Arc<HttpState>>) -> Response {
    let _guard = state.reload_lock.lock().await;
    match reload_store(&state.fetcher, &state.load).await {
        Ok(store) => {
            let summary = report::store_summary(&store);
            state.engine.handle().swap(store);
            json_response(StatusCode::OK, &summary)
        }
        Err(err) => {
            log::error!("Reload failed, keeping the current store: {err}");
            json_response(StatusCode::SERVICE_UNAVAILABLE, &report::load_error(&err))
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serialize_json(body) {
        Ok(text) => (status, [(CONTENT_TYPE, "application/json")], text).into_response(),
        Err(err) => {
            log::error!("Failed to serialize response: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
