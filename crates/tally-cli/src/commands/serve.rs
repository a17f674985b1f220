//! HTTP server command

use std::path::{Path, PathBuf};

use anyhow::Result;
use tally_server::ServerConfig;

use super::core::open_db;

/// Start the REST API server
pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    images_dir: PathBuf,
) -> Result<()> {
    let api_keys: Vec<String> = std::env::var("TALLY_API_KEYS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let allowed_origins: Vec<String> = std::env::var("TALLY_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if no_auth {
        println!("Warning: authentication disabled (--no-auth)");
    } else if api_keys.is_empty() {
        println!("Warning: no API keys set (TALLY_API_KEYS); all requests will be rejected");
        println!("         set TALLY_API_KEYS=key1,key2 or pass --no-auth for local use");
    }

    let config = ServerConfig {
        require_auth: !no_auth,
        allowed_origins,
        api_keys,
    };

    let db = open_db(db_path)?;

    println!("Database: {}", db.path());
    println!("Images:   {}", images_dir.display());
    println!("Listening on http://{}:{}", host, port);

    tally_server::serve(db, host, port, images_dir, config).await
}
