//! Tally Core Library
//!
//! Shared functionality for the Tally receipt-splitting tool:
//! - Exact decimal money arithmetic
//! - Receipt, ticket, and line-item models
//! - Document classification of untrusted model output
//! - Monetary reconciliation (derive-what's-missing, trust-what's-stated)
//! - Malformed-output recovery for LLM responses
//! - Pluggable vision backends (OpenAI-compatible, Gemini)
//! - SQLite persistence and the line-item mutation model

pub mod ai;
pub mod amount;
pub mod classify;
pub mod db;
pub mod error;
pub mod receipt;
pub mod reconcile;

pub use ai::{AnalyzerClient, GeminiBackend, MockBackend, OpenAiCompatBackend, VisionBackend};
pub use amount::Amount;
pub use classify::classify;
pub use db::{Database, ReceiptSummary, StoredReceipt};
pub use error::{Error, Result};
pub use receipt::{
    LineItem, LineItemPatch, NewLineItem, NotAReceipt, ReceiptDocument, RegularReceipt,
    TransportationTicket,
};
pub use reconcile::{reconcile, reconcile_ticket};
