//! HTTP layer for the document service.
//!
//! # Endpoints
//!
//! - `POST /documents`: create a document, returns 201
//! - `GET /documents/{share_id}`: fetch a document
//! - `PUT /documents/{share_id}`: replace a document's content
//! - `GET /health`: liveness plus a database ping

mod documents;
mod error;
mod health;

pub use error::ApiError;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use editer_core::DocumentService;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room left in the request body for JSON framing and escapes.
const JSON_OVERHEAD: usize = 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
    /// Largest content accepted from clients, in bytes
    pub max_document_size: usize,
    pub database_name: String,
}

impl AppState {
    pub fn new(service: Arc<DocumentService>, max_document_size: usize) -> Self {
        Self {
            service,
            max_document_size,
            database_name: "editer".to_string(),
        }
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }
}

/// Builds the application router.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    // Escaped control characters take up to six bytes each on the wire.
    let body_limit = state
        .max_document_size
        .saturating_mul(6)
        .saturating_add(JSON_OVERHEAD);

    Router::new()
        .route("/health", get(health::health))
        .route("/documents", post(documents::create_document))
        .route(
            "/documents/{share_id}",
            get(documents::get_document).put(documents::update_document),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the configured origins; permissive when none are configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|s| match s.parse::<HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", s);
                None
            }
        })
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    cors.allow_methods(Any).allow_headers(Any)
}

/// Binds the listener. `host` may be a hostname, IPv4 or IPv6 literal.
pub async fn bind(host: &str, port: u16) -> std::io::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((host, port)).await
}
