//! HTTP surface: the upload page, a JSON twin of it, and static uploads.

use crate::engine::EngineHandle;
use crate::page::{self, PageContext};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use emoface_core::Outcome;
use emoface_intake::{IntakeError, StoredUpload, UploadStore};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Multipart field names that may carry the image.
const IMAGE_FIELDS: [&str; 2] = ["image", "file"];

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub store: UploadStore,
}

impl AppState {
    async fn analyze(&self, stored: &StoredUpload) -> Outcome {
        match self.engine.analyze(stored.path.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "engine unavailable");
                Outcome::failed(e.to_string())
            }
        }
    }
}

/// Why an upload did not reach inference.
#[derive(Debug)]
enum UploadError {
    /// Missing file, empty filename or disallowed extension.
    Rejected(IntakeError),
    Malformed(MultipartError),
    Storage(String),
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.store.root());

    Router::new()
        .route("/", get(index).post(upload))
        .route("/api/analyze", post(api_analyze))
        .route("/health", get(health))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<String> {
    Html(page::render_index(None))
}

async fn upload(State(state): State<AppState>, multipart: Multipart) -> Response {
    let stored = match accept_upload(&state.store, multipart).await {
        Ok(stored) => stored,
        Err(UploadError::Rejected(reason)) => {
            tracing::info!(%reason, "upload rejected");
            return Redirect::to("/").into_response();
        }
        Err(UploadError::Malformed(e)) => {
            tracing::warn!(error = %e, "malformed multipart body");
            return Redirect::to("/").into_response();
        }
        Err(UploadError::Storage(e)) => {
            tracing::error!(error = %e, "failed to store upload");
            let outcome = Outcome::failed(e);
            let ctx = PageContext {
                mood: outcome.mood_text(),
                filename: "",
                image_url: String::new(),
                outcome: &outcome,
            };
            return Html(page::render_index(Some(&ctx))).into_response();
        }
    };

    let outcome = state.analyze(&stored).await;
    let ctx = PageContext {
        mood: outcome.mood_text(),
        filename: &stored.filename,
        image_url: image_url(&stored),
        outcome: &outcome,
    };
    Html(page::render_index(Some(&ctx))).into_response()
}

async fn api_analyze(State(state): State<AppState>, multipart: Multipart) -> Response {
    let stored = match accept_upload(&state.store, multipart).await {
        Ok(stored) => stored,
        Err(UploadError::Rejected(reason)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": reason.to_string() })))
                .into_response();
        }
        Err(UploadError::Malformed(e)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.body_text() })))
                .into_response();
        }
        Err(UploadError::Storage(e)) => {
            tracing::error!(error = %e, "failed to store upload");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e })))
                .into_response();
        }
    };

    let outcome = state.analyze(&stored).await;
    Json(json!({
        "filename": stored.filename,
        "image_url": image_url(&stored),
        "mood": outcome.mood_text(),
        "outcome": outcome,
    }))
    .into_response()
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "upload_dir": state.store.root().display().to_string(),
    }))
}

/// Pull the first image field out of the form and store it.
async fn accept_upload(
    store: &UploadStore,
    mut multipart: Multipart,
) -> Result<StoredUpload, UploadError> {
    let (filename, bytes) = loop {
        let Some(field) = multipart
            .next_field()
            .await
            .map_err(UploadError::Malformed)?
        else {
            return Err(UploadError::Rejected(IntakeError::MissingFile));
        };

        if !field.name().is_some_and(|name| IMAGE_FIELDS.contains(&name)) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes: Bytes = field.bytes().await.map_err(UploadError::Malformed)?;
        break (filename, bytes);
    };

    let store = store.clone();
    tokio::task::spawn_blocking(move || store.save(&filename, &bytes))
        .await
        .map_err(|e| UploadError::Storage(e.to_string()))?
        .map_err(|e| {
            if e.is_rejection() {
                UploadError::Rejected(e)
            } else {
                UploadError::Storage(e.to_string())
            }
        })
}

fn image_url(stored: &StoredUpload) -> String {
    format!("/uploads/{}", stored.filename)
}
