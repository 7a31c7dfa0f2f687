//! HTTP request handlers for the formula API.
//!
//! # Endpoints
//!
//! - `POST /formulas` - Render a formula into a display tree
//! - `GET /tmp/{module}/{scope}/{resource}` - Serve a rendered formula image
//! - `GET /renderers` - List registered renderers
//! - `GET /health` - Health check

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::cache::ImageStorage;
use crate::error::{CacheError, FormulaError};
use crate::formula::{DisplayBlock, FormulaService};
use crate::render::{FontSize, ImageType};
use crate::store::{RenderScope, FORMULA_MODULE};

/// Header naming the stored image type of a served formula image.
pub const IMAGE_TYPE_HEADER: &str = "x-formula-image-type";

/// Default Cache-Control max-age for formula images (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Application State
// =============================================================================

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub formula_service: Arc<FormulaService>,

    /// Storage the renderers write to; served under `/tmp`
    pub images: Arc<dyn ImageStorage>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(formula_service: FormulaService, images: Arc<dyn ImageStorage>) -> Self {
        Self {
            formula_service: Arc::new(formula_service),
            images,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of `POST /formulas`.
#[derive(Debug, Deserialize)]
pub struct FormulaBody {
    /// Formula text; missing text is reported like empty text
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub inline: bool,

    #[serde(default)]
    pub font_size: Option<FontSize>,

    #[serde(default)]
    pub image_type: Option<ImageType>,

    /// Renderer hint overriding the configured one
    #[serde(default)]
    pub renderer: Option<String>,

    pub scope: RenderScope,

    /// Return the formula text instead of failing on an invalid formula
    #[serde(default)]
    pub text_fallback: bool,
}

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_formula")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response of `GET /renderers`.
#[derive(Debug, Serialize)]
pub struct RenderersResponse {
    /// Registered renderer hints, sorted
    pub renderers: Vec<String>,

    pub default_renderer: String,

    pub safe_renderer: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors returned by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid render scope: {0:?}")]
    InvalidScope(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::Formula(FormulaError::ContentMissing) => {
                (StatusCode::BAD_REQUEST, "content_missing")
            }
            ApiError::Formula(FormulaError::InvalidFormula) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_formula")
            }
            ApiError::Cache(CacheError::Corrupted { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "corrupted_cache_entry")
            }
            ApiError::Cache(CacheError::Write { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            ApiError::InvalidScope(_) => (StatusCode::BAD_REQUEST, "invalid_scope"),
            ApiError::ResourceNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "Server error: {}", message);
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type, status = status.as_u16(), "Resource not found: {}", message);
        } else {
            warn!(error_type, status = status.as_u16(), "Client error: {}", message);
        }

        (status, Json(ErrorResponse::with_status(error_type, message, status))).into_response()
    }
}

impl IntoResponse for FormulaError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Render a formula.
///
/// # Endpoint
///
/// `POST /formulas`
///
/// ```json
/// { "text": "x^2", "inline": true, "scope": "wiki:Space.Page" }
/// ```
///
/// # Response
///
/// `200 OK` with the display tree:
/// ```json
/// { "type": "image", "url": "/tmp/formula/wiki%3ASpace.Page/3f2a...", "alt": "x^2", "class": "formula-inline" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request` for blank text (`content_missing`) or an unusable scope
/// - `422 Unprocessable Entity` if no renderer accepted the formula
pub async fn formula_handler(
    State(state): State<AppState>,
    Json(body): Json<FormulaBody>,
) -> Result<Json<DisplayBlock>, ApiError> {
    if !body.scope.is_addressable() {
        return Err(ApiError::InvalidScope(body.scope.to_string()));
    }

    let service = &state.formula_service;
    let mut request = service.request(body.text, body.inline);
    if let Some(font_size) = body.font_size {
        request = request.with_font_size(font_size);
    }
    if let Some(image_type) = body.image_type {
        request = request.with_image_type(image_type);
    }
    if let Some(renderer) = body.renderer {
        request = request.with_renderer(renderer);
    }

    let block = if body.text_fallback {
        service.render_or_text(&request, &body.scope).await?
    } else {
        service.render(&request, &body.scope).await?
    };

    Ok(Json(block))
}

/// Serve a rendered formula image.
///
/// # Endpoint
///
/// `GET /tmp/{module}/{scope}/{resource}`
///
/// Responds with the stored bytes, the MIME type recorded in the entry's type
/// marker, `Cache-Control` and `X-Formula-Image-Type` headers. A missing or
/// half-written entry is `404 Not Found`; a corrupted type marker is
/// `500 Internal Server Error`.
pub async fn temporary_resource_handler(
    State(state): State<AppState>,
    Path((module, scope, resource)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    if module != FORMULA_MODULE {
        return Err(ApiError::ResourceNotFound(format!("{module}/{scope}/{resource}")));
    }

    let scope = RenderScope::new(scope);
    let image = state
        .images
        .get(&resource, &scope)
        .await?
        .ok_or_else(|| ApiError::ResourceNotFound(format!("{module}/{scope}/{resource}")))?;

    let headers = [
        (header::CONTENT_TYPE, image.image_type.mime_type().to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (
            HeaderName::from_static(IMAGE_TYPE_HEADER),
            image.image_type.as_str().to_string(),
        ),
    ];

    Ok((StatusCode::OK, headers, Body::from(image.data)).into_response())
}

/// List the registered renderers.
///
/// # Endpoint
///
/// `GET /renderers`
pub async fn renderers_handler(State(state): State<AppState>) -> Json<RenderersResponse> {
    let service = &state.formula_service;
    Json(RenderersResponse {
        renderers: service.registry().names(),
        default_renderer: service.config().renderer.clone(),
        safe_renderer: service.config().safe_renderer.clone(),
    })
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// ```json
/// { "status": "healthy", "version": "0.1.0" }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
