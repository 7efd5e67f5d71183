use commentquick_core::{CoreError, LlmError, OpenAiConfig};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const PROVIDER: &str = "openai";
const USER_AGENT: &str = "commentquick/0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one completion; fixed per generation mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-generation backend. The output is free text; structural compliance
/// is the parser's job, not the model's.
pub trait ChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CoreError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    n: u8,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug)]
pub struct OpenAiClient {
    http_client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn map_error_status(&self, status: StatusCode, retry_after: Option<u64>) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthenticationFailed {
                provider: PROVIDER.to_string(),
            },
            429 => {
                let retry_after = retry_after.unwrap_or(60);
                warn!("Rate limited by {}, retry after {}s", PROVIDER, retry_after);
                LlmError::RateLimitExceeded {
                    provider: PROVIDER.to_string(),
                    retry_after,
                }
            }
            s if s >= 500 => LlmError::ServiceUnavailable {
                provider: PROVIDER.to_string(),
            },
            s => LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                status_code: s,
            },
        }
    }
}

impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CoreError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            n: 1,
        };

        let url = format!("{}/chat/completions", self.api_base);
        info!(
            "Requesting completion from {} ({} messages, max {} tokens)",
            self.model,
            messages.len(),
            params.max_tokens
        );

        let response = match self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Network error calling {}: {}", PROVIDER, e);
                if e.is_timeout() {
                    return Err(CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    }));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            error!("Completion request failed with status {}", status);
            return Err(CoreError::Llm(self.map_error_status(status, retry_after)));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            }
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(CoreError::Llm(LlmError::EmptyCompletion {
                provider: PROVIDER.to_string(),
            }));
        }

        debug!("Received completion of {} bytes", content.len());
        Ok(content)
    }
}
