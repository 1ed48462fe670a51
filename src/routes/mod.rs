//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The tile proxy binds `/tile` next to a few service endpoints and serves
//! the static prototype UI under `/app`. CORS is fully open so a viewer
//! hosted elsewhere can fetch tiles.

pub mod tile;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let web = ServeDir::new(&state.web_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/favicon.ico", get(favicon))
        .route("/tile", get(tile::get_tile))
        .nest_service("/app", web)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Visit /app for the prototype UI." }))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn favicon(State(state): State<AppState>) -> Response {
    let path = state.favicon_path();
    match tokio::fs::read(&path).await {
        Ok(body) => ([(header::CONTENT_TYPE, "image/x-icon")], body).into_response(),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, path = %path.display(), "favicon unreadable");
            }
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
