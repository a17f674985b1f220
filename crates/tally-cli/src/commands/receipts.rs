//! Stored receipt CLI commands

use anyhow::Result;
use tally_core::db::Database;

/// List stored receipts, most recent first
pub fn cmd_receipts_list(db: &Database) -> Result<()> {
    let receipts = db.list_receipts()?;

    if receipts.is_empty() {
        println!("No stored receipts. Analyze one with 'tally analyze photo.jpg --save'.");
        return Ok(());
    }

    println!("\nReceipts ({})", receipts.len());
    println!("{}", "─".repeat(70));

    for receipt in &receipts {
        let merchant = receipt.merchant.as_deref().unwrap_or("Unknown");
        let total = receipt
            .final_total
            .map(|t| format!("${}", t))
            .unwrap_or_else(|| "N/A".to_string());
        let date = receipt
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        println!(
            "  #{:<5} {:<28} {:>10}  {}  [{}]",
            receipt.id, merchant, total, date, receipt.document_type
        );
    }

    println!();
    Ok(())
}

/// Print one receipt as JSON, line items included
pub fn cmd_receipts_show(db: &Database, id: i64) -> Result<()> {
    match db.get_receipt(id)? {
        Some(receipt) => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(())
        }
        None => {
            println!("Receipt #{} not found", id);
            Ok(())
        }
    }
}

/// Delete a receipt and its line items
pub fn cmd_receipts_delete(db: &Database, id: i64) -> Result<()> {
    let image_path = db.delete_receipt(id)?;
    println!("Deleted receipt #{}", id);
    if let Some(path) = image_path {
        println!("Image kept at {}", path);
    }
    Ok(())
}
