//! Completion backends for the AI assessor
//!
//! An assessment is one chat completion: the assessor's system prompt and
//! the filled tender prompt go in, the reply text comes out.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Enough for a score line and a few paragraphs of reasoning
const MAX_REPLY_TOKENS: u16 = 500;
const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key set for {0:?}")]
    MissingKey(LlmProvider),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("rate limited")]
    RateLimited,

    #[error("{0}")]
    Api(String),

    #[error("reply carried no text")]
    EmptyReply,
}

impl LlmError {
    fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Api(e.to_string())
        }
    }
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One completion for `user` under the `system` prompt
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

pub type SharedBackend = Arc<dyn LlmBackend>;

/// Which API family serves the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
}

/// Connect the assessor's backend.
///
/// `base_url` points the OpenAI provider at a compatible server, which may
/// run without a key. Every request is bounded by `timeout`.
pub fn connect_backend(
    provider: LlmProvider,
    api_key: &str,
    model: &str,
    base_url: Option<&str>,
    timeout: Duration,
) -> Result<SharedBackend, LlmError> {
    let api_key = api_key.trim();
    if api_key.is_empty() && (provider == LlmProvider::Anthropic || base_url.is_none()) {
        return Err(LlmError::MissingKey(provider));
    }
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Api(e.to_string()))?;

    Ok(match provider {
        LlmProvider::OpenAi => {
            let mut config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(base_url) = base_url {
                config = config.with_api_base(base_url);
            }
            Arc::new(OpenAiCompletion {
                client: Client::with_config(config).with_http_client(http),
                model: model.to_string(),
                timeout,
            })
        }
        LlmProvider::Anthropic => Arc::new(AnthropicCompletion {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        }),
    })
}

struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiCompletion {
    fn map_error(&self, e: OpenAIError) -> LlmError {
        match e {
            OpenAIError::Reqwest(e) if e.is_timeout() => LlmError::Timeout(self.timeout),
            other => LlmError::Api(other.to_string()),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompletion {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(|e| self.map_error(e))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user)
            .build()
            .map_err(|e| self.map_error(e))?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system),
                ChatCompletionRequestMessage::User(user),
            ])
            .temperature(TEMPERATURE)
            .max_tokens(MAX_REPLY_TOKENS)
            .build()
            .map_err(|e| self.map_error(e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.map_error(e))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyReply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

struct AnthropicCompletion {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[async_trait]
impl LlmBackend for AnthropicCompletion {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_REPLY_TOKENS,
            "temperature": TEMPERATURE,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let response = self
            .http
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            return Err(LlmError::Api(format!("Anthropic API returned {}", status)));
        }

        let reply: Value = response
            .json()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;
        anthropic_text(&reply).ok_or(LlmError::EmptyReply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Text blocks of a Messages API reply, joined
fn anthropic_text(reply: &Value) -> Option<String> {
    let text: Vec<&str> = reply
        .get("content")?
        .as_array()?
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    let text = text.join("\n");
    (!text.trim().is_empty()).then_some(text)
}
