//! Signed URL authentication for temporary formula resources.
//!
//! Image URLs handed out in display trees can be signed with HMAC-SHA256 so
//! that only URLs produced by this service are served:
//!
//! ```text
//! signature = HMAC-SHA256(secret_key, "{path}?{canonical_query}")
//! ```
//!
//! The canonical query holds every parameter except `sig` (including `exp`),
//! sorted by key then value:
//!
//! ```text
//! /tmp/formula/wiki%3ASpace.Page/3f2a...?exp=1735689600&sig=abc123...
//! ```
//!
//! Signatures expire, and verification compares them in constant time.
//!
//! # Example
//!
//! ```rust
//! use formula_imager::server::auth::SignedUrlAuth;
//! use std::time::Duration;
//!
//! let auth = SignedUrlAuth::new("my-secret-key");
//!
//! let path = "/tmp/formula/page/abc123";
//! let (signature, expiry) = auth.sign(path, Duration::from_secs(3600));
//!
//! assert!(auth.verify(path, &signature, expiry, &[]).is_ok());
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{OriginalUri, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::handlers::ErrorResponse;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Errors
// =============================================================================

/// Reasons a signed URL is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing signature parameter")]
    MissingSignature,

    #[error("Missing expiry parameter")]
    MissingExpiry,

    #[error("Signature expired at {expired_at} (current time: {current_time})")]
    Expired { expired_at: u64, current_time: u64 },

    #[error("Invalid signature")]
    InvalidSignature,

    /// Not hex, or `sig` given twice
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Not an integer, or `exp` given twice
    #[error("Invalid expiry format")]
    InvalidExpiryFormat,
}

impl AuthError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::MissingSignature => (StatusCode::UNAUTHORIZED, "missing_signature"),
            AuthError::MissingExpiry => (StatusCode::UNAUTHORIZED, "missing_expiry"),
            AuthError::Expired { .. } => (StatusCode::UNAUTHORIZED, "signature_expired"),
            AuthError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            AuthError::InvalidSignatureFormat => {
                (StatusCode::BAD_REQUEST, "invalid_signature_format")
            }
            AuthError::InvalidExpiryFormat => (StatusCode::BAD_REQUEST, "invalid_expiry_format"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let message = self.to_string();

        // A bad signature may be tampering; everything else is routine
        if self == AuthError::InvalidSignature {
            warn!(error_type, status = status.as_u16(), "Authentication failed: {}", message);
        } else {
            debug!(error_type, status = status.as_u16(), "Authentication failed: {}", message);
        }

        (status, Json(ErrorResponse::with_status(error_type, message, status))).into_response()
    }
}

// =============================================================================
// Signed URL Authentication
// =============================================================================

/// HMAC-SHA256 signer and verifier for resource URLs.
#[derive(Clone)]
pub struct SignedUrlAuth {
    secret_key: Vec<u8>,
}

impl SignedUrlAuth {
    /// Create an authenticator. The key should be at least 32 bytes.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Sign a path valid for `ttl`, returning `(signature, expiry)`.
    pub fn sign(&self, path: &str, ttl: Duration) -> (String, u64) {
        self.sign_with_params(path, ttl, &[])
    }

    /// Sign a path together with extra query parameters (excluding `exp` and `sig`).
    pub fn sign_with_params(
        &self,
        path: &str,
        ttl: Duration,
        params: &[(&str, &str)],
    ) -> (String, u64) {
        let expiry = unix_now().saturating_add(ttl.as_secs());
        (self.compute_signature(path, expiry, params), expiry)
    }

    /// Sign a path with a fixed expiry timestamp (Unix seconds).
    pub fn sign_with_expiry(&self, path: &str, expiry: u64) -> String {
        self.compute_signature(path, expiry, &[])
    }

    /// Verify a signature for `path`, `expiry` and the extra query parameters.
    pub fn verify(
        &self,
        path: &str,
        signature: &str,
        expiry: u64,
        params: &[(&str, &str)],
    ) -> Result<(), AuthError> {
        let current_time = unix_now();
        if current_time > expiry {
            return Err(AuthError::Expired {
                expired_at: expiry,
                current_time,
            });
        }

        let provided = hex::decode(signature).map_err(|_| AuthError::InvalidSignatureFormat)?;
        let expected = self.mac(path, expiry, params);

        if provided.ct_eq(&expected).into() {
            Ok(())
        } else {
            Err(AuthError::InvalidSignature)
        }
    }

    /// Build `{base_url}{path}?{params}&exp=..&sig=..`.
    pub fn generate_signed_url(
        &self,
        base_url: &str,
        path: &str,
        ttl: Duration,
        extra_params: &[(&str, &str)],
    ) -> String {
        let (signature, expiry) = self.sign_with_params(path, ttl, extra_params);

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in extra_params {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("exp", &expiry.to_string());
        serializer.append_pair("sig", &signature);

        format!("{}{}?{}", base_url, path, serializer.finish())
    }

    fn compute_signature(&self, path: &str, expiry: u64, params: &[(&str, &str)]) -> String {
        hex::encode(self.mac(path, expiry, params))
    }

    fn mac(&self, path: &str, expiry: u64, params: &[(&str, &str)]) -> Vec<u8> {
        // HMAC accepts keys of any length, so this cannot fail
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(signature_base(path, expiry, params).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn signature_base(path: &str, expiry: u64, params: &[(&str, &str)]) -> String {
    let expiry = expiry.to_string();
    let mut pairs: Vec<(&str, &str)> = params.to_vec();
    pairs.push(("exp", expiry.as_str()));
    pairs.sort();

    let canonical = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, canonical)
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Reject requests whose URL does not carry a valid `exp`/`sig` pair.
pub async fn auth_middleware(
    State(auth): State<SignedUrlAuth>,
    OriginalUri(original_uri): OriginalUri,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let query = original_uri.query().unwrap_or("");
    let mut signature: Option<String> = None;
    let mut expiry: Option<u64> = None;
    let mut extra_params: Vec<(String, String)> = Vec::new();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "sig" => {
                if signature.replace(value.into_owned()).is_some() {
                    return Err(AuthError::InvalidSignatureFormat);
                }
            }
            "exp" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| AuthError::InvalidExpiryFormat)?;
                if expiry.replace(parsed).is_some() {
                    return Err(AuthError::InvalidExpiryFormat);
                }
            }
            _ => extra_params.push((key.into_owned(), value.into_owned())),
        }
    }

    let signature = signature.ok_or(AuthError::MissingSignature)?;
    let expiry = expiry.ok_or(AuthError::MissingExpiry)?;

    let extra: Vec<(&str, &str)> = extra_params
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    auth.verify(original_uri.path(), &signature, expiry, &extra)?;

    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
