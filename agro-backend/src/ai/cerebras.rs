use crate::ai::{CompletionBackend, Message};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.cerebras.ai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama3.1-8b";

/// Sampling settings tuned for conversational advisory answers.
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Cerebras inference client (OpenAI-compatible chat completions API)
#[derive(Debug, Clone)]
pub struct CerebrasClient {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Cerebras error bodies come either OpenAI-style (`{"error": {"message"}}`)
/// or flat (`{"message": "..."}`).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl CerebrasClient {
    pub fn new(api_key: &str, endpoint: Option<&str>, model: Option<&str>) -> Result<Self, String> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        headers.insert(header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }

    pub async fn generate_text(&self, messages: Vec<Message>) -> Result<String, String> {
        let api_messages: Vec<ApiMessage> = messages
            .into_iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: m.content,
            })
            .collect();

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: api_messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        log::debug!("Sending request to Cerebras API ({})", self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Cerebras API request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                if let Some(detail) = error_response.error {
                    return Err(format!("Cerebras API error: {}", detail.message));
                }
                if let Some(message) = error_response.message {
                    return Err(format!("Cerebras API error: {}", message));
                }
            }

            return Err(format!(
                "Cerebras API returned error status: {}, body: {}",
                status, error_text
            ));
        }

        let response_data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Cerebras response: {}", e))?;

        let content = response_data
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err("Cerebras API returned no content".to_string());
        }

        Ok(content)
    }
}

#[async_trait]
impl CompletionBackend for CerebrasClient {
    async fn generate(&self, messages: Vec<Message>) -> Result<String, String> {
        self.generate_text(messages).await
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
