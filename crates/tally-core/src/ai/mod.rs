//! Pluggable vision-model backend abstraction
//!
//! Backends turn a document image into raw model text; everything after
//! that (JSON recovery, classification, reconciliation) is deterministic
//! and lives outside the backend. Provider setup happens once, explicitly,
//! when the client is constructed - there is no hidden module-level
//! "already configured" state.
//!
//! # Architecture
//!
//! - `VisionBackend` trait: the raw-analysis interface
//! - `AnalyzerClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch, plus the full `analyze_document` pipeline
//! - Backend implementations: `OpenAiCompatBackend`, `GeminiBackend`,
//!   `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `TALLY_AI_PROVIDER`: Backend to use (openai_compatible, gemini, mock).
//!   Default: openai_compatible when its host is set, else gemini when its
//!   key is set.
//! - `OPENAI_COMPATIBLE_HOST`: Chat-completions server URL
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required
//! - `GEMINI_API_KEY`: Google Gemini API key
//! - `GEMINI_MODEL`: Gemini model (default: gemini-2.0-flash-lite)

mod gemini;
mod mock;
mod openai_compat;
pub mod parsing;
pub mod prompt;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use openai_compat::OpenAiCompatBackend;

use async_trait::async_trait;
use tracing::debug;

use crate::classify::classify;
use crate::error::Result;
use crate::receipt::ReceiptDocument;

/// Interface every vision backend implements.
///
/// `analyze` returns the model's raw text; the backend never parses it.
/// The output is untrusted by contract - recovery and classification
/// handle fences, prose, and malformed JSON downstream.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Send the document image to the model and return its raw response.
    async fn analyze(&self, image_data: &[u8]) -> Result<String>;

    /// Whether the provider is reachable/configured.
    async fn health_check(&self) -> bool;

    /// Provider name for logging and the `backends` CLI command.
    fn name(&self) -> &'static str;
}

/// Concrete analyzer wrapper: Clone + static dispatch over the configured
/// backend, constructed once at process start and injected everywhere a
/// document needs analyzing.
#[derive(Clone)]
pub enum AnalyzerClient {
    OpenAiCompat(OpenAiCompatBackend),
    Gemini(GeminiBackend),
    Mock(MockBackend),
}

impl AnalyzerClient {
    /// Build from environment variables. Returns `None` when no provider
    /// is configured; callers treat analysis as unavailable rather than
    /// failing at startup.
    pub fn from_env() -> Option<Self> {
        match std::env::var("TALLY_AI_PROVIDER").ok().as_deref() {
            Some("openai_compatible") => {
                OpenAiCompatBackend::from_env().map(Self::OpenAiCompat)
            }
            Some("gemini") => GeminiBackend::from_env().map(Self::Gemini),
            Some("mock") => Some(Self::Mock(MockBackend::new())),
            Some(other) => {
                tracing::warn!(provider = other, "unknown TALLY_AI_PROVIDER");
                None
            }
            None => {
                // No explicit provider: pick whichever is configured
                OpenAiCompatBackend::from_env()
                    .map(Self::OpenAiCompat)
                    .or_else(|| GeminiBackend::from_env().map(Self::Gemini))
            }
        }
    }

    pub fn backend(&self) -> &dyn VisionBackend {
        match self {
            Self::OpenAiCompat(b) => b,
            Self::Gemini(b) => b,
            Self::Mock(b) => b,
        }
    }

    pub fn name(&self) -> &'static str {
        self.backend().name()
    }

    pub async fn health_check(&self) -> bool {
        self.backend().health_check().await
    }

    /// The full analysis pipeline: model text, JSON recovery,
    /// classification, reconciliation. Returns a document whose monetary
    /// fields already satisfy the arithmetic invariants.
    pub async fn analyze_document(&self, image_data: &[u8]) -> Result<ReceiptDocument> {
        let raw = self.backend().analyze(image_data).await?;
        debug!(backend = self.name(), chars = raw.len(), "model response received");

        let value = parsing::recover_json(&raw)?;
        classify(value)
    }
}
