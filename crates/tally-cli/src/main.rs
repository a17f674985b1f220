//! Tally CLI - Split bills from receipt photos
//!
//! Usage:
//!   tally init                  Initialize database
//!   tally analyze photo.jpg     Analyze a receipt image
//!   tally receipts list         List stored receipts
//!   tally serve --port 3000     Start web server

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Analyze { image, save } => commands::cmd_analyze(&cli.db, &image, save).await,
        Commands::Receipts { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(ReceiptsAction::List) => commands::cmd_receipts_list(&db),
                Some(ReceiptsAction::Show { id }) => commands::cmd_receipts_show(&db, id),
                Some(ReceiptsAction::Delete { id }) => commands::cmd_receipts_delete(&db, id),
            }
        }
        Commands::Backends => commands::cmd_backends().await,
        Commands::Serve {
            port,
            host,
            no_auth,
            images_dir,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, images_dir).await,
    }
}
