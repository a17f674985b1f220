//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Split bills from receipt photos
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Analyze receipt photos and split the bill", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Analyze a receipt image and print the reconciled document
    Analyze {
        /// Image file to analyze
        image: PathBuf,

        /// Persist the analyzed receipt to the database
        #[arg(long)]
        save: bool,
    },

    /// Manage stored receipts
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Check configured vision backends
    Backends,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a
        /// network. By default, the server requires a Bearer API key
        /// (TALLY_API_KEYS, comma-separated).
        #[arg(long)]
        no_auth: bool,

        /// Directory for storing uploaded receipt images
        #[arg(long, default_value = "images")]
        images_dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// List stored receipts, most recent first
    List,

    /// Print one receipt as JSON, line items included
    Show {
        /// Receipt ID
        id: i64,
    },

    /// Delete a receipt and its line items
    Delete {
        /// Receipt ID
        id: i64,
    },
}
