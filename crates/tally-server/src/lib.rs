//! Tally Web Server
//!
//! Axum-based REST API for receipt analysis and bill splitting.
//!
//! Security posture:
//! - Bearer API keys with constant-time comparison (use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Upload size cap
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::ai::AnalyzerClient;
use tally_core::db::Database;

mod handlers;

#[cfg(test)]
mod tests;

/// Maximum image upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Vision analyzer, absent when no provider is configured
    pub analyzer: Option<AnalyzerClient>,
    /// Directory for storing uploaded receipt images
    pub images_dir: std::path::PathBuf,
}

/// Authentication middleware - validates Bearer API keys
///
/// Keys are compared using constant-time comparison to prevent timing
/// attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time
/// comparison to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() {
            if provided_bytes.ct_eq(key_bytes).into() {
                return true;
            }
        }
    }
    false
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(
    db: Database,
    config: ServerConfig,
    analyzer: Option<AnalyzerClient>,
    images_dir: std::path::PathBuf,
) -> Router {
    if let Some(ref client) = analyzer {
        info!(backend = client.name(), "vision analyzer configured");
    } else {
        info!("vision analyzer not configured (set TALLY_AI_PROVIDER to enable analysis)");
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        analyzer,
        images_dir,
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Analysis and receipt records
        .route("/receipts/analyze", post(handlers::analyze_receipt))
        .route("/receipts", get(handlers::list_receipts))
        .route(
            "/receipts/:id",
            get(handlers::get_receipt).delete(handlers::delete_receipt),
        )
        .route("/receipts/:id/image", get(handlers::get_receipt_image))
        .route("/receipts/:id/fields", put(handlers::update_receipt_fields))
        // Line-item mutation model
        .route("/receipts/:id/line-items", post(handlers::add_line_item))
        .route(
            "/receipts/:id/line-items/:item_id",
            put(handlers::update_line_item).delete(handlers::delete_line_item),
        )
        .route(
            "/receipts/:id/line-items/:item_id/assignments",
            put(handlers::set_assignments),
        );

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server with the given configuration
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    images_dir: std::path::PathBuf,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("authentication disabled - do not expose to network!");
    }

    let analyzer = AnalyzerClient::from_env();
    if let Some(ref client) = analyzer {
        if client.health_check().await {
            info!(backend = client.name(), "vision analyzer connected");
        } else {
            warn!(backend = client.name(), "vision analyzer configured but not responding");
        }
    }

    let app = create_router(db, config, analyzer, images_dir);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<tally_core::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn service_unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<tally_core::Error> for AppError {
    fn from(err: tally_core::Error) -> Self {
        use tally_core::Error;

        match err {
            Error::NotFound(message) => Self {
                status: StatusCode::NOT_FOUND,
                message,
                internal: None,
            },
            Error::Validation { field, message } => Self {
                status: StatusCode::BAD_REQUEST,
                message: format!("{}: {}", field, message),
                internal: None,
            },
            Error::UnparsableOutput { ref reason, .. } => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: format!("could not parse analysis output: {}", reason),
                internal: Some(err),
            },
            Error::Classification(message) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: format!("could not classify document: {}", message),
                internal: None,
            },
            Error::Analysis(_) => Self {
                status: StatusCode::BAD_GATEWAY,
                // Provider error details stay in the logs
                message: "analysis backend request failed".to_string(),
                internal: Some(err),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                internal: Some(other),
            },
        }
    }
}
