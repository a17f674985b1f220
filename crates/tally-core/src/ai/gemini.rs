//! Google Gemini backend implementation
//!
//! Uses the `generateContent` REST API with the image attached as
//! inline base64 data.
//!
//! # Configuration
//!
//! Environment variables:
//! - `GEMINI_API_KEY`: API key (required)
//! - `GEMINI_MODEL`: Model name (default: gemini-2.0-flash-lite)

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::prompt::{EXTRACTION_SYSTEM_PROMPT, EXTRACTION_USER_PROMPT};
use super::VisionBackend;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Vision backend for the Google Gemini API.
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Required: `GEMINI_API_KEY`
    /// Optional: `GEMINI_MODEL` (default: gemini-2.0-flash-lite)
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok()?;
        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash-lite".to_string());
        Some(Self::new(&api_key, &model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_content(&self, image_data: &[u8]) -> Result<String> {
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = GenerateContentRequest {
            system_instruction: Some(SystemInstruction {
                parts: vec![Part::Text {
                    text: EXTRACTION_SYSTEM_PROMPT.to_string(),
                }],
            }),
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: EXTRACTION_USER_PROMPT.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: base64_image,
                        },
                    },
                ],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent",
            GEMINI_API_BASE, self.model
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Analysis(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let gen_response: GenerateContentResponse = response.json().await?;

        gen_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| {
                c.content.parts.into_iter().find_map(|p| match p {
                    ResponsePart::Text { text } => Some(text),
                    ResponsePart::Other => None,
                })
            })
            .ok_or_else(|| Error::Analysis("No response from Gemini API".into()))
    }
}

/// Gemini generateContent request
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    #[serde(rename = "system_instruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

/// Request content part (text or inline image data)
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Gemini generateContent response
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Text { text: String },
    Other,
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    async fn analyze(&self, image_data: &[u8]) -> Result<String> {
        self.generate_content(image_data).await
    }

    async fn health_check(&self) -> bool {
        // Listing models is the cheapest authenticated call
        let url = format!("{}/models", GEMINI_API_BASE);
        match self
            .http_client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
