//! Client for the external multimodal model.
//!
//! Every analysis is one chat-completions call made of a system instruction
//! (task, required JSON shape, German output) and a user instruction carrying
//! the image as a base64 `data:` URL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::analysis::{AnalysisReply, ReplyError};
use crate::config::ModelConfig;
use crate::normalize::NormalizedImage;

pub const SYSTEM_PROMPT: &str = r#"You are a product analyzer for the "Binnenmarkt Preisdetektiv" app.
Your job is to:
1. Identify the product in the image.
2. Estimate the current market price in the EU.
3. Estimate what the price would be without the EU internal market (with tariffs, higher production costs, less competition).
4. Provide a brief explanation (2-3 sentences) of why the EU internal market causes this price difference.
5. If the product is likely not produced in the EU, indicate that.

Format your response as JSON with the following fields:
{
  "productName": "Product name",
  "currentPrice": "Estimated current price with currency",
  "withoutEUPrice": "Estimated price without EU internal market",
  "priceIncrease": "Percentage increase",
  "explanation": "Brief explanation",
  "madeInEU": true/false
}

Du musst die Antwort auf Deutsch geben. Alle Felder müssen auf Deutsch sein. Preise sollten in Euro angegeben werden."#;

pub const USER_PROMPT: &str = "Identifiziere dieses Produkt und analysiere seinen Preis im EU-Binnenmarkt im Vergleich zu ohne EU-Binnenmarkt.";

/// Upper bound for upstream error bodies copied into logs.
const MAX_LOGGED_BODY_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,
    #[error("request to model failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected completion envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("completion contained no message content")]
    EmptyReply,
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

/// Turns one product photo into one validated analysis.
#[async_trait]
pub trait ProductAnalyzer: Send + Sync {
    async fn analyze(&self, image: &NormalizedImage) -> Result<AnalysisReply, ModelError>;
}

/// OpenAI-compatible chat-completions backend.
pub struct OpenAiAnalyzer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiAnalyzer {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

pub fn build_payload(model: &str, image_data_url: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "system",
                "content": SYSTEM_PROMPT
            },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": USER_PROMPT },
                    { "type": "image_url", "image_url": { "url": image_data_url } }
                ]
            }
        ],
        "response_format": { "type": "json_object" }
    })
}

#[async_trait]
impl ProductAnalyzer for OpenAiAnalyzer {
    async fn analyze(&self, image: &NormalizedImage) -> Result<AnalysisReply, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;
        let payload = build_payload(&self.model, &image.data_url());

        debug!(
            "📤 Sending {} byte {} image to {}",
            image.bytes.len(),
            image.media_type,
            self.model
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_LOGGED_BODY_CHARS).collect(),
            });
        }

        let completion: ChatCompletion =
            serde_json::from_str(&body).map_err(ModelError::Envelope)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelError::EmptyReply)?;

        let reply = AnalysisReply::parse(content)?;
        debug!("✅ Identified product: {}", reply.result.product_name);
        Ok(reply)
    }
}
