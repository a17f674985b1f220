//! One-shot image analysis command

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tally_core::ai::AnalyzerClient;

use super::open_db;

/// Analyze an image and print the reconciled document as JSON.
///
/// With `--save`, the result is persisted like an API upload would be,
/// including duplicate detection by content hash.
pub async fn cmd_analyze(db_path: &Path, image: &Path, save: bool) -> Result<()> {
    if !image.exists() {
        return Err(anyhow!("File not found: {}", image.display()));
    }

    let analyzer = AnalyzerClient::from_env().ok_or_else(|| {
        anyhow!("No vision backend configured. Set TALLY_AI_PROVIDER (see 'tally backends').")
    })?;

    let image_data = std::fs::read(image).context("Failed to read image file")?;

    let document = analyzer.analyze_document(&image_data).await?;
    println!("{}", serde_json::to_string_pretty(&document)?);

    if save {
        let db = open_db(db_path)?;
        let content_hash = hex::encode(Sha256::digest(&image_data));

        if let Some(existing) = db.get_receipt_by_hash(&content_hash)? {
            println!();
            println!("Already stored as receipt #{}", existing.id);
            return Ok(());
        }

        let path_str = image.to_string_lossy();
        let id = db.create_receipt(&document, Some(&path_str), Some(&content_hash))?;
        println!();
        println!("Stored as receipt #{}", id);
    }

    Ok(())
}
