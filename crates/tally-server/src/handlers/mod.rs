//! API request handlers

mod line_items;
mod receipts;

pub use line_items::{add_line_item, delete_line_item, set_assignments, update_line_item};
pub use receipts::{
    analyze_receipt, delete_receipt, get_receipt, get_receipt_image, health, list_receipts,
    update_receipt_fields,
};
