//! Router configuration for the formula service.
//!
//! # Route Structure
//!
//! ```text
//! /health                              - Health check (public)
//! /renderers                           - Registered renderers (public)
//! POST /formulas                       - Render a formula (public)
//! /tmp/{module}/{scope}/{resource}     - Formula images (signed when auth is enabled)
//! ```
//!
//! Signing only guards image downloads: the URLs in display trees are signed
//! by the service's [`ResourceUrlSerializer`](crate::store::ResourceUrlSerializer)
//! with the same secret.

use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, SignedUrlAuth};
use super::handlers::{
    formula_handler, health_handler, renderers_handler, temporary_resource_handler, AppState,
    DEFAULT_CACHE_MAX_AGE,
};
use crate::store::TEMPORARY_RESOURCE_PREFIX;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Secret key for signed URL authentication
    pub auth_secret: String,

    /// Whether image downloads require a signed URL
    pub auth_enabled: bool,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a configuration with signed image URLs.
    pub fn new(auth_secret: impl Into<String>) -> Self {
        Self {
            auth_secret: auth_secret.into(),
            auth_enabled: true,
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }

    /// Create a configuration serving images without signatures.
    pub fn without_auth() -> Self {
        Self {
            auth_enabled: false,
            ..Self::new(String::new())
        }
    }

    /// Set allowed CORS origins. An empty list disallows cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_auth_enabled(mut self, enabled: bool) -> Self {
        self.auth_enabled = enabled;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// `state.cache_max_age` is replaced by the value in `config`.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let state = state.with_cache_max_age(config.cache_max_age);

    let mut resource_routes = Router::new()
        .route(
            &format!("{TEMPORARY_RESOURCE_PREFIX}/{{module}}/{{scope}}/{{resource}}"),
            get(temporary_resource_handler),
        )
        .with_state(state.clone());
    if config.auth_enabled {
        let auth = SignedUrlAuth::new(&config.auth_secret);
        resource_routes =
            resource_routes.layer(middleware::from_fn_with_state(auth, auth_middleware));
    }

    let api_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/renderers", get(renderers_handler))
        .route("/formulas", post(formula_handler))
        .with_state(state);

    let router = Router::new()
        .merge(api_routes)
        .merge(resource_routes)
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Create a router without signed URLs, for local development and tests.
pub fn create_dev_router(state: AppState) -> Router {
    create_router(state, RouterConfig::without_auth())
}

fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
