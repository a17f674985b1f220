//! Line-item mutation handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::{AppError, AppState, SuccessResponse};
use tally_core::receipt::{LineItem, LineItemPatch, NewLineItem};

/// POST /api/receipts/:id/line-items - Insert a line item at the head
///
/// Client-supplied `id` or `assignments` keys are rejected here; the
/// server assigns both.
pub async fn add_line_item(
    State(state): State<Arc<AppState>>,
    Path(receipt_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<LineItem>, AppError> {
    let new_item: NewLineItem = serde_json::from_value(body)
        .map_err(|e| AppError::bad_request(&format!("invalid line item: {}", e)))?;

    let item = state.db.add_line_item(receipt_id, new_item)?;
    Ok(Json(item))
}

/// Response for line item updates
#[derive(Serialize)]
pub struct LineItemUpdateResponse {
    #[serde(flatten)]
    pub item: LineItem,
    /// Keys from the request body that are not mutable and were skipped
    pub ignored_fields: Vec<String>,
}

/// PUT /api/receipts/:id/line-items/:item_id - Partial update
///
/// Non-mutable keys (including `id`) are skipped and reported, never
/// applied and never an error.
pub async fn update_line_item(
    State(state): State<Arc<AppState>>,
    Path((receipt_id, item_id)): Path<(i64, Uuid)>,
    Json(body): Json<Value>,
) -> Result<Json<LineItemUpdateResponse>, AppError> {
    let (patch, ignored_fields) = LineItemPatch::from_value(body)?;

    if !ignored_fields.is_empty() {
        warn!(receipt_id, %item_id, ?ignored_fields, "ignored keys in line item update");
    }

    let item = state.db.update_line_item(receipt_id, item_id, patch)?;
    Ok(Json(LineItemUpdateResponse {
        item,
        ignored_fields,
    }))
}

/// DELETE /api/receipts/:id/line-items/:item_id
pub async fn delete_line_item(
    State(state): State<Arc<AppState>>,
    Path((receipt_id, item_id)): Path<(i64, Uuid)>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_line_item(receipt_id, item_id)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Request body for assignment replacement
#[derive(Deserialize)]
pub struct AssignmentsBody {
    pub assignments: Vec<String>,
}

/// PUT /api/receipts/:id/line-items/:item_id/assignments - Replace the
/// assignment list (never merged with the existing one)
pub async fn set_assignments(
    State(state): State<Arc<AppState>>,
    Path((receipt_id, item_id)): Path<(i64, Uuid)>,
    Json(body): Json<AssignmentsBody>,
) -> Result<Json<LineItem>, AppError> {
    let item = state
        .db
        .set_assignments(receipt_id, item_id, &body.assignments)?;
    Ok(Json(item))
}
