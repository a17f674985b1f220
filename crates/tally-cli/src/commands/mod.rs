//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db)
//! - `analyze` - One-shot image analysis
//! - `receipts` - Stored receipt commands
//! - `backends` - Vision backend health check
//! - `serve` - Web server command

pub mod analyze;
pub mod backends;
pub mod core;
pub mod receipts;
pub mod serve;

// Re-export command functions for main.rs
pub use analyze::*;
pub use backends::*;
pub use core::*;
pub use receipts::*;
pub use serve::*;
