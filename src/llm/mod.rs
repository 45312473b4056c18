//! Text generation through an OpenAI-compatible chat completions endpoint.

use crate::config::LlmConfig;
use crate::error::{CodescribeError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`, returned verbatim.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAICompatibleLlm {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAICompatibleLlm {
    pub fn new(
        base_url: &str,
        model: String,
        api_key: Option<String>,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CodescribeError::LanguageModel(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
            max_tokens,
            temperature,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());

        let llm = Self::new(
            &config.base_url,
            config.model.clone(),
            api_key,
            config.max_new_tokens,
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )?;

        log::info!("Language model: {} at {}", config.model, llm.endpoint);
        Ok(llm)
    }
}

#[async_trait]
impl LanguageModel for OpenAICompatibleLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let start = std::time::Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| CodescribeError::LanguageModel(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(CodescribeError::LanguageModel(format!(
                "Generation API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CodescribeError::LanguageModel(format!("Failed to parse response: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CodescribeError::LanguageModel("Response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        log::debug!("Generation took {:?}", start.elapsed());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn llm(server: &MockServer) -> OpenAICompatibleLlm {
        OpenAICompatibleLlm::new(
            &format!("{}/v1/", server.uri()),
            "flan".to_string(),
            None,
            250,
            0.1,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_content_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "flan",
                "max_tokens": 250,
                "stream": false,
                "messages": [{"role": "user", "content": "Question: hi\nHelpful Answer:"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  It prints hello. "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = llm(&server).generate("Question: hi\nHelpful Answer:").await.unwrap();
        assert_eq!(answer, "  It prints hello. ");
    }

    #[tokio::test]
    async fn test_generate_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
            .mount(&server)
            .await;

        let err = llm(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(err, CodescribeError::LanguageModel(_)));
        assert!(err.to_string().contains("out of memory"));
    }

    #[tokio::test]
    async fn test_generate_no_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = llm(&server).generate("prompt").await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
