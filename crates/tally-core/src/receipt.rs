//! Domain models for Tally
//!
//! A payment document decodes into one of three variants: a regular receipt
//! with line items, a transportation ticket, or "not a receipt". The
//! classifier (`classify`) picks the variant; the reconciliation engine
//! (`reconcile`) fills in and enforces the arithmetic between the monetary
//! fields. This module only defines the shapes and the per-field rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::amount::Amount;
use crate::error::{Error, Result};

fn default_true() -> bool {
    true
}

fn default_quantity() -> f64 {
    1.0
}

/// Lenient date (de)serialization for model-extracted dates.
///
/// Vision models emit dates in whatever shape the document used. Anything
/// that is not `YYYY-MM-DD` becomes `None` rather than failing the whole
/// document.
mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
    }
}

/// One purchased item on a regular receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Ephemeral identifier assigned at extraction or insertion.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default, alias = "price_per_item")]
    pub unit_price: Amount,
    #[serde(default)]
    pub total_price: Amount,
    /// Labels for the people responsible for this item (bill splitting).
    #[serde(default)]
    pub assignments: Vec<String>,
}

impl LineItem {
    /// Validate and derive per-item fields.
    ///
    /// A zero `total_price` is derived as `unit_price * quantity`; a
    /// non-zero supplied value is trusted and only re-quantized, never
    /// recomputed.
    pub fn normalize(&mut self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "line item name must not be empty"));
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(Error::validation(
                "quantity",
                format!("quantity must be non-negative, got {}", self.quantity),
            ));
        }
        if self.total_price.is_zero() {
            self.total_price = self.unit_price.mul_quantity(self.quantity).quantize();
        } else {
            self.total_price = self.total_price.quantize();
        }
        self.unit_price = self.unit_price.quantize();
        Ok(())
    }
}

/// Creation shape for a user-inserted line item.
///
/// Client-supplied identifiers and assignment lists are forbidden here:
/// the server assigns a fresh UUID and an empty assignment list. Unknown
/// keys are rejected outright rather than silently dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLineItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default, alias = "price_per_item")]
    pub unit_price: Amount,
    #[serde(default)]
    pub total_price: Amount,
}

impl NewLineItem {
    /// Build the full line item, assigning a fresh identifier.
    pub fn into_line_item(self) -> Result<LineItem> {
        let mut item = LineItem {
            id: Uuid::new_v4(),
            name: self.name,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
            assignments: Vec::new(),
        };
        item.normalize()?;
        Ok(item)
    }
}

/// Mutable line item fields, for partial updates.
const LINE_ITEM_MUTABLE_FIELDS: &[&str] =
    &["name", "quantity", "unit_price", "price_per_item", "total_price", "assignments"];

/// Partial update for a line item. Only the allow-listed mutable fields
/// are ever applied; identifiers and receipt linkage are not mutable
/// through this path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemPatch {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    #[serde(alias = "price_per_item")]
    pub unit_price: Option<Amount>,
    pub total_price: Option<Amount>,
    pub assignments: Option<Vec<String>>,
}

impl LineItemPatch {
    /// Decode a patch from raw JSON, separating out keys that are not on
    /// the allow-list. Callers log the ignored keys; an attempted `id`
    /// overwrite lands there rather than failing the request.
    pub fn from_value(value: Value) -> Result<(LineItemPatch, Vec<String>)> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::validation(
                    "line_item",
                    format!("expected a JSON object, got {}", json_type_name(&other)),
                ))
            }
        };

        let mut allowed = serde_json::Map::new();
        let mut ignored = Vec::new();
        for (key, val) in map {
            if LINE_ITEM_MUTABLE_FIELDS.contains(&key.as_str()) {
                allowed.insert(key, val);
            } else {
                ignored.push(key);
            }
        }

        let patch: LineItemPatch = serde_json::from_value(Value::Object(allowed))
            .map_err(|e| Error::validation("line_item", e.to_string()))?;
        Ok((patch, ignored))
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && self.unit_price.is_none()
            && self.total_price.is_none()
            && self.assignments.is_none()
    }

    /// Apply the patch in place. Aggregates on the parent receipt are not
    /// recomputed here; line-item edits and receipt-aggregate edits are
    /// independent operations.
    pub fn apply(self, item: &mut LineItem) -> Result<()> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(Error::validation("name", "line item name must not be empty"));
            }
            item.name = name;
        }
        if let Some(quantity) = self.quantity {
            if !quantity.is_finite() || quantity < 0.0 {
                return Err(Error::validation(
                    "quantity",
                    format!("quantity must be non-negative, got {}", quantity),
                ));
            }
            item.quantity = quantity;
        }
        if let Some(unit_price) = self.unit_price {
            item.unit_price = unit_price.quantize();
        }
        if let Some(total_price) = self.total_price {
            item.total_price = total_price.quantize();
        }
        if let Some(assignments) = self.assignments {
            item.assignments = assignments;
        }
        Ok(())
    }
}

/// A regular payment document: receipt, bill, invoice, order confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegularReceipt {
    #[serde(default = "default_true")]
    pub is_receipt: bool,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default, with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub subtotal: Amount,
    #[serde(default)]
    pub tax: Amount,
    #[serde(default)]
    pub tip: Amount,
    #[serde(default)]
    pub gratuity: Amount,
    #[serde(default)]
    pub total: Amount,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Whether the document's item prices already contain tax. Changes how
    /// subtotal is derived from the item sum.
    #[serde(default)]
    pub tax_included_in_items: bool,
    /// The subtotal exactly as printed on the document.
    #[serde(default)]
    pub display_subtotal: Amount,
    #[serde(default)]
    pub items_total: Amount,
    #[serde(default)]
    pub pretax_total: Amount,
    #[serde(default)]
    pub posttax_total: Amount,
    #[serde(default)]
    pub final_total: Amount,
}

impl RegularReceipt {
    /// Scalar fields mutable through `update_receipt_fields`. `line_items`
    /// has its own operations and identity fields are never mutable.
    pub const MUTABLE_FIELDS: &'static [&'static str] = &[
        "merchant",
        "date",
        "subtotal",
        "tax",
        "tip",
        "gratuity",
        "total",
        "payment_method",
        "tax_included_in_items",
        "display_subtotal",
        "items_total",
        "pretax_total",
        "posttax_total",
        "final_total",
    ];

    /// Merge a partial scalar update into this receipt and validate the
    /// merged result as a whole.
    ///
    /// `line_items`, `id`, and other identity fields are rejected; keys not
    /// on the allow-list are reported back for logging. Validation failure
    /// leaves `self` untouched, so callers get all-or-nothing semantics.
    pub fn merge_fields(&self, patch: &Value) -> Result<(RegularReceipt, Vec<String>)> {
        let map = patch.as_object().ok_or_else(|| {
            Error::validation(
                "receipt",
                format!("expected a JSON object, got {}", json_type_name(patch)),
            )
        })?;

        for forbidden in ["line_items", "id", "is_receipt", "created_at"] {
            if map.contains_key(forbidden) {
                return Err(Error::validation(
                    forbidden,
                    "field is not mutable through receipt updates",
                ));
            }
        }

        // Serialize current state without items, overlay allow-listed keys,
        // and round-trip through the full shape so a bad partial update
        // (negative amount, wrong type) can never produce an invalid record.
        let mut detached = self.clone();
        detached.line_items = Vec::new();
        let mut merged = match serde_json::to_value(&detached)? {
            Value::Object(map) => map,
            _ => unreachable!("receipt serializes to an object"),
        };

        let mut ignored = Vec::new();
        for (key, val) in map {
            if Self::MUTABLE_FIELDS.contains(&key.as_str()) {
                merged.insert(key.clone(), val.clone());
            } else {
                ignored.push(key.clone());
            }
        }

        let mut updated: RegularReceipt = serde_json::from_value(Value::Object(merged))
            .map_err(|e| Error::validation("receipt", e.to_string()))?;
        updated.line_items = self.line_items.clone();
        Ok((updated, ignored))
    }
}

/// A transportation ticket: train, bus, flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportationTicket {
    #[serde(default = "TransportationTicket::document_type")]
    pub document_type: String,
    #[serde(default = "default_true")]
    pub is_receipt: bool,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub ticket_number: Option<String>,
    #[serde(default, with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub passenger: Option<String>,
    #[serde(default, rename = "class")]
    pub travel_class: Option<String>,
    #[serde(default)]
    pub fare: Amount,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub taxes: Amount,
    #[serde(default)]
    pub total: Amount,
}

impl TransportationTicket {
    pub fn document_type() -> String {
        "transportation_ticket".to_string()
    }
}

/// The image did not contain a payment document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotAReceipt {
    pub is_receipt: bool,
}

impl Default for NotAReceipt {
    fn default() -> Self {
        Self { is_receipt: false }
    }
}

/// A classified payment document.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReceiptDocument {
    NotAReceipt(NotAReceipt),
    Ticket(TransportationTicket),
    Receipt(RegularReceipt),
}

impl ReceiptDocument {
    pub fn is_receipt(&self) -> bool {
        !matches!(self, ReceiptDocument::NotAReceipt(_))
    }

    /// Stable discriminator used for storage and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ReceiptDocument::NotAReceipt(_) => "not_a_receipt",
            ReceiptDocument::Ticket(_) => "transportation_ticket",
            ReceiptDocument::Receipt(_) => "receipt",
        }
    }

    pub fn as_receipt(&self) -> Option<&RegularReceipt> {
        match self {
            ReceiptDocument::Receipt(r) => Some(r),
            _ => None,
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
