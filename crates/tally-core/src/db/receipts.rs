//! Receipt storage and the line-item mutation model
//!
//! Every mutation is all-or-nothing: validation happens against full
//! model shapes before anything is written, and a failed validation
//! leaves the stored record untouched.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{parse_datetime, Database, ReceiptSummary, StoredReceipt};
use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::receipt::{
    LineItem, LineItemPatch, NewLineItem, NotAReceipt, ReceiptDocument, RegularReceipt,
    TransportationTicket,
};

impl Database {
    /// Persist an analyzed document. Line items are split out of the
    /// document JSON into their own rows, positions matching extraction
    /// order.
    pub fn create_receipt(
        &self,
        document: &ReceiptDocument,
        image_path: Option<&str>,
        content_hash: Option<&str>,
    ) -> Result<i64> {
        let (document_json, merchant, receipt_date, final_total, items) = match document {
            ReceiptDocument::Receipt(receipt) => {
                let mut detached = receipt.clone();
                let items = std::mem::take(&mut detached.line_items);
                (
                    serde_json::to_string(&detached)?,
                    detached.merchant.clone(),
                    detached.date,
                    Some(detached.final_total),
                    items,
                )
            }
            ReceiptDocument::Ticket(ticket) => (
                serde_json::to_string(ticket)?,
                ticket.carrier.clone(),
                ticket.date,
                Some(ticket.total),
                Vec::new(),
            ),
            ReceiptDocument::NotAReceipt(doc) => {
                (serde_json::to_string(doc)?, None, None, None, Vec::new())
            }
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO receipts (document_type, document_json, merchant, receipt_date,
             final_total, image_path, content_hash)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                document.kind(),
                document_json,
                merchant,
                receipt_date.map(|d| d.to_string()),
                final_total.map(|t| t.to_string()),
                image_path,
                content_hash,
            ],
        )?;
        let receipt_id = tx.last_insert_rowid();

        for (position, item) in items.iter().enumerate() {
            tx.execute(
                "INSERT INTO line_items (id, receipt_id, name, quantity, unit_price,
                 total_price, assignments, position)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    item.id.to_string(),
                    receipt_id,
                    item.name,
                    item.quantity,
                    item.unit_price.to_string(),
                    item.total_price.to_string(),
                    serde_json::to_string(&item.assignments)?,
                    position as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(receipt_id)
    }

    /// Fetch a document by ID, with line items in display order.
    pub fn get_receipt(&self, id: i64) -> Result<Option<StoredReceipt>> {
        let conn = self.conn()?;
        let row = conn
            .prepare(
                "SELECT id, document_type, document_json, image_path, created_at
                 FROM receipts WHERE id = ?",
            )?
            .query_row(params![id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()?;

        let Some((id, document_type, document_json, image_path, created_at)) = row else {
            return Ok(None);
        };

        let document = match document_type.as_str() {
            "receipt" => {
                let mut receipt: RegularReceipt = serde_json::from_str(&document_json)?;
                receipt.line_items = self.get_line_items(id)?;
                ReceiptDocument::Receipt(receipt)
            }
            "transportation_ticket" => {
                let ticket: TransportationTicket = serde_json::from_str(&document_json)?;
                ReceiptDocument::Ticket(ticket)
            }
            "not_a_receipt" => {
                let doc: NotAReceipt = serde_json::from_str(&document_json)?;
                ReceiptDocument::NotAReceipt(doc)
            }
            other => {
                return Err(Error::validation(
                    "document_type",
                    format!("unknown stored document type '{}'", other),
                ))
            }
        };

        Ok(Some(StoredReceipt {
            id,
            document,
            image_path,
            created_at: parse_datetime(&created_at),
        }))
    }

    /// Look up a document by image content hash (duplicate upload detection).
    pub fn get_receipt_by_hash(&self, content_hash: &str) -> Result<Option<StoredReceipt>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM receipts WHERE content_hash = ?",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => self.get_receipt(id),
            None => Ok(None),
        }
    }

    /// List stored documents, most recent first.
    pub fn list_receipts(&self) -> Result<Vec<ReceiptSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_type, merchant, receipt_date, final_total, created_at
             FROM receipts ORDER BY created_at DESC, id DESC",
        )?;

        let summaries = stmt
            .query_map([], |row| {
                let receipt_date: Option<String> = row.get(3)?;
                let final_total: Option<String> = row.get(4)?;
                let created_at: String = row.get(5)?;
                Ok(ReceiptSummary {
                    id: row.get(0)?,
                    document_type: row.get(1)?,
                    merchant: row.get(2)?,
                    date: receipt_date
                        .and_then(|s| chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    final_total: final_total.and_then(|s| Amount::parse(&s).ok()),
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    /// Delete a document and (by cascade) its line items.
    ///
    /// Returns the stored image path so the caller can remove the file.
    pub fn delete_receipt(&self, id: i64) -> Result<Option<String>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let image_path: Option<String> = tx
            .query_row(
                "SELECT image_path FROM receipts WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("receipt {} not found", id)))?;

        tx.execute("DELETE FROM receipts WHERE id = ?", params![id])?;
        tx.commit()?;

        Ok(image_path)
    }

    // ========== Line-item mutation model ==========

    /// Line items for a receipt, head first.
    pub fn get_line_items(&self, receipt_id: i64) -> Result<Vec<LineItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, quantity, unit_price, total_price, assignments
             FROM line_items WHERE receipt_id = ? ORDER BY position ASC, rowid ASC",
        )?;

        let items = stmt
            .query_map(params![receipt_id], |row| Self::row_to_line_item(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Insert a user-created line item at the head of the item ordering.
    ///
    /// Aggregate fields on the receipt are intentionally left alone; item
    /// edits and receipt-aggregate edits are independent operations.
    pub fn add_line_item(&self, receipt_id: i64, new_item: NewLineItem) -> Result<LineItem> {
        let item = new_item.into_line_item()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let document_type: String = tx
            .query_row(
                "SELECT document_type FROM receipts WHERE id = ?",
                params![receipt_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("receipt {} not found", receipt_id)))?;

        if document_type != "receipt" {
            return Err(Error::validation(
                "receipt",
                format!("cannot add line items to a {} document", document_type),
            ));
        }

        // Head insertion: one below the current minimum position.
        let head_position: i64 = tx.query_row(
            "SELECT COALESCE(MIN(position), 0) - 1 FROM line_items WHERE receipt_id = ?",
            params![receipt_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO line_items (id, receipt_id, name, quantity, unit_price,
             total_price, assignments, position)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.id.to_string(),
                receipt_id,
                item.name,
                item.quantity,
                item.unit_price.to_string(),
                item.total_price.to_string(),
                serde_json::to_string(&item.assignments)?,
                head_position,
            ],
        )?;

        tx.commit()?;
        debug!(receipt_id, item_id = %item.id, "line item added at head");
        Ok(item)
    }

    /// Apply a partial update to one line item. Unknown keys were already
    /// filtered by `LineItemPatch::from_value`; absent items are `NotFound`.
    pub fn update_line_item(
        &self,
        receipt_id: i64,
        item_id: Uuid,
        patch: LineItemPatch,
    ) -> Result<LineItem> {
        let conn = self.conn()?;

        let mut item = conn
            .prepare(
                "SELECT id, name, quantity, unit_price, total_price, assignments
                 FROM line_items WHERE receipt_id = ? AND id = ?",
            )?
            .query_row(params![receipt_id, item_id.to_string()], |row| {
                Self::row_to_line_item(row)
            })
            .optional()?
            .ok_or_else(|| {
                Error::NotFound(format!("line item {} not found on receipt {}", item_id, receipt_id))
            })?;

        patch.apply(&mut item)?;

        conn.execute(
            "UPDATE line_items SET name = ?, quantity = ?, unit_price = ?,
             total_price = ?, assignments = ?
             WHERE receipt_id = ? AND id = ?",
            params![
                item.name,
                item.quantity,
                item.unit_price.to_string(),
                item.total_price.to_string(),
                serde_json::to_string(&item.assignments)?,
                receipt_id,
                item_id.to_string(),
            ],
        )?;

        Ok(item)
    }

    /// Delete one line item; `NotFound` when absent.
    pub fn delete_line_item(&self, receipt_id: i64, item_id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "DELETE FROM line_items WHERE receipt_id = ? AND id = ?",
            params![receipt_id, item_id.to_string()],
        )?;

        if affected == 0 {
            return Err(Error::NotFound(format!(
                "line item {} not found on receipt {}",
                item_id, receipt_id
            )));
        }
        Ok(())
    }

    /// Replace (not merge) the assignment list of one line item.
    pub fn set_assignments(
        &self,
        receipt_id: i64,
        item_id: Uuid,
        assignments: &[String],
    ) -> Result<LineItem> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE line_items SET assignments = ? WHERE receipt_id = ? AND id = ?",
            params![
                serde_json::to_string(assignments)?,
                receipt_id,
                item_id.to_string(),
            ],
        )?;

        if affected == 0 {
            return Err(Error::NotFound(format!(
                "line item {} not found on receipt {}",
                item_id, receipt_id
            )));
        }

        let item = conn
            .prepare(
                "SELECT id, name, quantity, unit_price, total_price, assignments
                 FROM line_items WHERE receipt_id = ? AND id = ?",
            )?
            .query_row(params![receipt_id, item_id.to_string()], |row| {
                Self::row_to_line_item(row)
            })?;

        Ok(item)
    }

    /// Merge-validate a scalar field update against the full receipt shape,
    /// then persist. Returns the updated record plus the ignored keys.
    ///
    /// A failed validation returns before anything is written.
    pub fn update_receipt_fields(
        &self,
        receipt_id: i64,
        patch: &Value,
    ) -> Result<(StoredReceipt, Vec<String>)> {
        let stored = self
            .get_receipt(receipt_id)?
            .ok_or_else(|| Error::NotFound(format!("receipt {} not found", receipt_id)))?;

        let ReceiptDocument::Receipt(receipt) = &stored.document else {
            return Err(Error::validation(
                "receipt",
                format!("cannot update fields of a {} document", stored.document.kind()),
            ));
        };

        let (updated, ignored) = receipt.merge_fields(patch)?;
        if !ignored.is_empty() {
            debug!(receipt_id, ?ignored, "ignored non-mutable keys in field update");
        }

        let mut detached = updated.clone();
        detached.line_items = Vec::new();

        let conn = self.conn()?;
        conn.execute(
            "UPDATE receipts SET document_json = ?, merchant = ?, receipt_date = ?,
             final_total = ? WHERE id = ?",
            params![
                serde_json::to_string(&detached)?,
                detached.merchant,
                detached.date.map(|d| d.to_string()),
                detached.final_total.to_string(),
                receipt_id,
            ],
        )?;

        Ok((
            StoredReceipt {
                id: stored.id,
                document: ReceiptDocument::Receipt(updated),
                image_path: stored.image_path,
                created_at: stored.created_at,
            },
            ignored,
        ))
    }

    /// Helper to convert a row to a LineItem
    fn row_to_line_item(row: &rusqlite::Row) -> rusqlite::Result<LineItem> {
        let id_str: String = row.get(0)?;
        let unit_price: String = row.get(3)?;
        let total_price: String = row.get(4)?;
        let assignments: String = row.get(5)?;

        Ok(LineItem {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            name: row.get(1)?,
            quantity: row.get(2)?,
            unit_price: Amount::parse(&unit_price).unwrap_or_default(),
            total_price: Amount::parse(&total_price).unwrap_or_default(),
            assignments: serde_json::from_str(&assignments).unwrap_or_default(),
        })
    }
}
