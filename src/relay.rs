use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

use crate::model::{ModelError, ProductAnalyzer};
use crate::normalize::{self, JPEG_MEDIA_TYPE};
use crate::page;

/// Multipart field holding the photo.
pub const IMAGE_FIELD: &str = "image";

pub const NO_IMAGE_MESSAGE: &str = "No image provided";
pub const INVALID_UPLOAD_MESSAGE: &str = "Invalid upload";
pub const UPLOAD_TOO_LARGE_MESSAGE: &str = "Image too large";
pub const ANALYSIS_FAILED_MESSAGE: &str = "An error occurred while analyzing the image";

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<dyn ProductAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: Arc<dyn ProductAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("no image field in upload")]
    MissingImage,
    #[error("not a multipart upload: {0}")]
    NotMultipart(#[from] MultipartRejection),
    #[error("unreadable multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RelayError::MissingImage => {
                warn!("Rejected upload: {}", self);
                (StatusCode::BAD_REQUEST, NO_IMAGE_MESSAGE)
            }
            RelayError::NotMultipart(_) => {
                warn!("Rejected upload: {}", self);
                (StatusCode::BAD_REQUEST, INVALID_UPLOAD_MESSAGE)
            }
            RelayError::Multipart(e) => {
                warn!("Rejected upload: {}", self);
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    (StatusCode::PAYLOAD_TOO_LARGE, UPLOAD_TOO_LARGE_MESSAGE)
                } else {
                    (StatusCode::BAD_REQUEST, INVALID_UPLOAD_MESSAGE)
                }
            }
            RelayError::Model(e) => {
                error!("Analysis failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ANALYSIS_FAILED_MESSAGE)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze_image))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

struct Upload {
    data: Vec<u8>,
    media_type: String,
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<Upload>, RelayError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let media_type = field
            .content_type()
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or(JPEG_MEDIA_TYPE)
            .to_string();
        let data = field.bytes().await?;
        if data.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Upload {
            data: data.to_vec(),
            media_type,
        }));
    }
    Ok(None)
}

/// `POST /api/analyze`: one image in, the model's JSON analysis out.
pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RelayError> {
    let start = Instant::now();
    let mut multipart = multipart?;

    let upload = read_image_field(&mut multipart)
        .await?
        .ok_or(RelayError::MissingImage)?;

    let image = normalize::normalize_orientation(&upload.data, &upload.media_type);
    debug!(
        "Received {} byte {} upload (normalized: {})",
        upload.data.len(),
        upload.media_type,
        image.normalized
    );

    let reply = state.analyzer.analyze(&image).await?;

    debug!("Analysis finished in {}ms", start.elapsed().as_millis());
    Ok(([(header::CONTENT_TYPE, "application/json")], reply.raw).into_response())
}
