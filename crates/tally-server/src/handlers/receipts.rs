//! Receipt analysis and record handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{AppError, AppState, SuccessResponse, MAX_UPLOAD_SIZE};
use tally_core::db::{ReceiptSummary, StoredReceipt};

/// GET /api/health - Service and analyzer status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let analyzer = match &state.analyzer {
        Some(client) => serde_json::json!({
            "configured": true,
            "backend": client.name(),
            "reachable": client.health_check().await,
        }),
        None => serde_json::json!({ "configured": false }),
    };

    Json(serde_json::json!({
        "status": "ok",
        "analyzer": analyzer,
    }))
}

/// Response for receipt analysis
#[derive(Serialize)]
pub struct AnalyzeResponse {
    /// True when the uploaded image matched an already-analyzed one
    pub duplicate: bool,
    #[serde(flatten)]
    pub receipt: StoredReceipt,
}

/// POST /api/receipts/analyze - Analyze an uploaded receipt image
///
/// The request body is the raw image bytes. Re-uploads of an identical
/// image return the stored record instead of spending another model call.
pub async fn analyze_receipt(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body or file too large (max 10MB)"))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("No image data provided"));
    }

    let content_hash = hex::encode(Sha256::digest(&bytes));

    // Duplicate upload: return the existing record
    if let Some(existing) = state.db.get_receipt_by_hash(&content_hash)? {
        info!(receipt_id = existing.id, "duplicate image upload");
        return Ok(Json(AnalyzeResponse {
            duplicate: true,
            receipt: existing,
        }));
    }

    let analyzer = state
        .analyzer
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("Analysis backend not configured"))?;

    let document = analyzer.analyze_document(&bytes).await?;

    // Persist the image only once analysis succeeded
    if !state.images_dir.exists() {
        std::fs::create_dir_all(&state.images_dir)
            .map_err(|e| AppError::internal(&format!("Failed to create images directory: {}", e)))?;
    }
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("receipt_{}_{}.jpg", timestamp, &content_hash[..8]);
    let image_path = state.images_dir.join(&filename);
    std::fs::write(&image_path, &bytes)
        .map_err(|e| AppError::internal(&format!("Failed to save receipt image: {}", e)))?;
    let path_str = image_path.to_string_lossy().to_string();

    let receipt_id = state
        .db
        .create_receipt(&document, Some(&path_str), Some(&content_hash))?;

    let receipt = state
        .db
        .get_receipt(receipt_id)?
        .ok_or_else(|| AppError::internal("Receipt vanished after creation"))?;

    info!(receipt_id, kind = receipt.document.kind(), "receipt analyzed");

    Ok(Json(AnalyzeResponse {
        duplicate: false,
        receipt,
    }))
}

/// GET /api/receipts - List stored receipts, most recent first
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReceiptSummary>>, AppError> {
    Ok(Json(state.db.list_receipts()?))
}

/// GET /api/receipts/:id - Get a receipt with ordered line items
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<StoredReceipt>, AppError> {
    let receipt = state
        .db
        .get_receipt(id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    Ok(Json(receipt))
}

/// DELETE /api/receipts/:id - Delete a receipt, its line items, and its image
pub async fn delete_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let image_path = state.db.delete_receipt(id)?;

    // Delete the image file if it is within images_dir (path traversal protection)
    if let Some(path) = image_path {
        let image_path = std::path::Path::new(&path);
        if let (Ok(canonical_image), Ok(canonical_dir)) = (
            std::fs::canonicalize(image_path),
            std::fs::canonicalize(&state.images_dir),
        ) {
            if canonical_image.starts_with(&canonical_dir) {
                let _ = std::fs::remove_file(&canonical_image);
            } else {
                warn!(path = %path, "receipt image path outside images directory, skipping delete");
            }
        }
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/receipts/:id/image - Fetch the stored receipt image
pub async fn get_receipt_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let receipt = state
        .db
        .get_receipt(id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    let path = receipt
        .image_path
        .ok_or_else(|| AppError::not_found("Receipt has no stored image"))?;

    let bytes = std::fs::read(&path)
        .map_err(|e| AppError::internal(&format!("Failed to read receipt image: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/jpeg")],
        bytes,
    )
        .into_response())
}

/// Response for scalar field updates
#[derive(Serialize)]
pub struct ReceiptUpdateResponse {
    #[serde(flatten)]
    pub receipt: StoredReceipt,
    /// Keys from the request body that are not mutable and were skipped
    pub ignored_fields: Vec<String>,
}

/// PUT /api/receipts/:id/fields - Merge-validate a scalar field update
pub async fn update_receipt_fields(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<Value>,
) -> Result<Json<ReceiptUpdateResponse>, AppError> {
    let (receipt, ignored_fields) = state.db.update_receipt_fields(id, &patch)?;

    if !ignored_fields.is_empty() {
        warn!(receipt_id = id, ?ignored_fields, "ignored keys in receipt field update");
    }

    Ok(Json(ReceiptUpdateResponse {
        receipt,
        ignored_fields,
    }))
}
