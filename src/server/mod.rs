//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   POST /formulas            GET /tmp/formula/{scope}/{id}       │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    auth     │  │        routes           │  │
//! │  │ (requests)  │  │ (signed URL)│  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └───────────────┬───────────────────────────────┬─────────────────┘
//!                 ▼                               ▼
//!          FormulaService                    ImageStorage
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{auth_middleware, AuthError, SignedUrlAuth};
pub use handlers::{
    formula_handler, health_handler, renderers_handler, temporary_resource_handler, ApiError,
    AppState, ErrorResponse, FormulaBody, HealthResponse, RenderersResponse,
    DEFAULT_CACHE_MAX_AGE, IMAGE_TYPE_HEADER,
};
pub use routes::{create_dev_router, create_router, RouterConfig};
