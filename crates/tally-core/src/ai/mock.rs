//! Mock backend for testing and offline development
//!
//! Returns canned raw-text responses without any network access, so the
//! recovery and classification stages can be exercised end to end.

use async_trait::async_trait;

use crate::error::Result;

use super::VisionBackend;

/// Canned default: a small receipt the pipeline can reconcile.
const DEFAULT_RESPONSE: &str = r#"```json
{
    "is_receipt": true,
    "merchant": "Mock Diner",
    "date": "2025-01-15",
    "line_items": [
        {"name": "Coffee", "quantity": 2, "price_per_item": 3.50},
        {"name": "Bagel", "quantity": 1, "price_per_item": 4.25}
    ],
    "tax": 0.90,
    "tip": 2.00,
    "payment_method": "card"
}
```"#;

/// Always-healthy backend returning a fixed raw response.
#[derive(Clone)]
pub struct MockBackend {
    response: String,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            response: DEFAULT_RESPONSE.to_string(),
        }
    }

    /// Return a specific raw response, fences and all.
    pub fn with_response(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionBackend for MockBackend {
    async fn analyze(&self, _image_data: &[u8]) -> Result<String> {
        Ok(self.response.clone())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
