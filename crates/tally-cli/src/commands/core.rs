//! Core command implementations and shared utilities

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::db::Database;

/// Open the database, running migrations if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("Initializing database at {}...", db_path.display());

    let _db = open_db(db_path)?;

    println!("Database initialized.");
    println!();
    println!("Next steps:");
    println!("  1. Configure a vision backend (TALLY_AI_PROVIDER, see 'tally backends')");
    println!("  2. Analyze a receipt: tally analyze photo.jpg");
    println!("  3. Start the API server: tally serve");

    Ok(())
}
