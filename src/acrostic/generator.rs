#![forbid(unsafe_code)]

//! Text generation backends.  Handlers only see the `TextGenerator` trait so
//! tests can substitute their own implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::acrostic::prompt::PromptSpec;
use crate::utils::config::GeneratorConfig;
use crate::utils::errors::GenerationError;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const ANTHROPIC_VERSION : &str = "2023-06-01";

// ***************************************************************************
//                                  Trait
// ***************************************************************************
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send the prompt and return the generated text block.
    async fn generate(&self, prompt: &PromptSpec) -> Result<String, GenerationError>;
}

// ***************************************************************************
//                              Wire Types
// ***************************************************************************
#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: &'a str,
    pub messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RequestMessage<'a> {
    pub role: &'static str,
    pub content: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RequestContent<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

// ***************************************************************************
//                           Anthropic Generator
// ***************************************************************************
/// Anthropic Messages API generator.
pub struct AnthropicGenerator {
    client: Client,
    api_key: Option<String>,
    config: GeneratorConfig,
}

impl AnthropicGenerator {
    /// A missing key is accepted here; every call then fails.
    pub fn new(config: GeneratorConfig, api_key: Option<String>) -> Self {
        Self { client: Client::new(), api_key, config }
    }

    fn build_headers(&self) -> Result<HeaderMap, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| GenerationError::Auth(format!("Invalid API key: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, prompt: &PromptSpec) -> Result<String, GenerationError> {
        let headers = self.build_headers()?;
        let body = build_request(&self.config, prompt);

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url.trim_end_matches('/')))
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;

            if status == 401 || status == 403 {
                return Err(GenerationError::Auth(format!("HTTP {}: {}", status, text)));
            }
            return Err(GenerationError::Api(format!("HTTP {}: {}", status, text)));
        }

        let text = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&text)?;
        extract_text(parsed)
    }
}

// ***************************************************************************
//                            Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_request:
// ---------------------------------------------------------------------------
/** Build the Messages API body: the fixed system prompt plus one user message
 * holding the word as a single text block.
 */
pub fn build_request<'a>(config: &'a GeneratorConfig, prompt: &'a PromptSpec) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system: prompt.system,
        messages: vec![RequestMessage {
            role: "user",
            content: vec![RequestContent { kind: "text", text: &prompt.user }],
        }],
    }
}

// ---------------------------------------------------------------------------
// extract_text:
// ---------------------------------------------------------------------------
/** The result is the first content block, which must be non-empty text. */
pub fn extract_text(response: MessagesResponse) -> Result<String, GenerationError> {
    match response.content.into_iter().next() {
        Some(ResponseContent::Text { text }) if !text.trim().is_empty() => Ok(text),
        _ => Err(GenerationError::EmptyContent),
    }
}
