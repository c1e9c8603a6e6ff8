//! HTTP chat-completion client for an OpenAI-compatible API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use vaultqa_core::{Result, VaultQaError};
use vaultqa_llm::{ChatCompleter, ChatMessage};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatClientConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            timeout_seconds: 120,
        }
    }
}

pub struct HttpChatClient {
    config: ChatClientConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                VaultQaError::external_service("chat", format!("client build failed: {}", e))
            })?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChatCompleter for HttpChatClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: &messages,
            temperature,
            max_tokens,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VaultQaError::external_service("chat", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VaultQaError::external_service(
                "chat",
                format!("{} {}", status, body),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            VaultQaError::external_service("chat", format!("bad response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| VaultQaError::external_service("chat", "empty choices"))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
