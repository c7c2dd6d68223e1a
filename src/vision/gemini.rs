//! Gemini `generateContent` captioning client

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{Result, TutorError};
use crate::vision::{Caption, Captioner};

pub const DEFAULT_VISION_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_VISION_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct GeminiCaptioner {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiCaptioner {
    pub fn new(base_url: &str, model: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TutorError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn request(&self, image: &[u8], mime_type: &str, instruction: &str) -> Result<GenerateResponse> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: instruction.to_string() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
        };
        debug!(model = %self.model, bytes = image.len(), mime_type, "requesting caption");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorError::VisionApi(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TutorError::VisionApi(format!("HTTP {}: {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| TutorError::VisionApi(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl Captioner for GeminiCaptioner {
    async fn caption(&self, image: &[u8], mime_type: &str, instruction: &str) -> Caption {
        match self.request(image, mime_type, instruction).await {
            Ok(response) => interpret(response),
            Err(e) => {
                warn!(error = %e, "caption request failed");
                Caption::Failed(e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

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

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct SafetyRating {
    category: String,
    probability: String,
}

fn render_ratings(ratings: &[SafetyRating]) -> String {
    ratings
        .iter()
        .map(|r| format!("{}: {}", r.category, r.probability))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a response to a caption, treating an empty candidate as a safety block
pub(crate) fn interpret(response: GenerateResponse) -> Caption {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback {
            Some(PromptFeedback { block_reason: Some(reason), safety_ratings }) => {
                Caption::Blocked(format!("{} ({})", reason, render_ratings(&safety_ratings)))
            }
            _ => Caption::Failed("No valid response from the model.".to_string()),
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Caption::Text(text.trim().to_string());
    }

    let ratings = render_ratings(&candidate.safety_ratings);
    match candidate.finish_reason.as_deref() {
        Some("SAFETY") | None => Caption::Blocked(ratings),
        Some(reason) if ratings.is_empty() => Caption::Blocked(reason.to_string()),
        Some(_) => Caption::Blocked(ratings),
    }
}
