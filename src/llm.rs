//! Chat-completion client shared by the query enhancer and relevance ranker.
//!
//! Two backends are supported:
//!
//! | Provider | Endpoint | Auth |
//! |----------|----------|------|
//! | `openai` | `POST {url}/v1/chat/completions` | `OPENAI_API_KEY` bearer token |
//! | `ollama` | `POST {url}/api/chat` | none |
//!
//! Exactly one request is made per call. Deadlines are imposed by the
//! caller, so the client itself carries no overall timeout.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

use crate::config::AssistConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    OpenAI,
    Ollama,
}

/// A configured chat endpoint.
pub struct ChatClient {
    backend: Backend,
    model: String,
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatClient {
    /// Build a client from an `[enhancer]` or `[ranker]` section.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not a chat backend, `model` is unset, or the
    /// OpenAI backend is selected without `OPENAI_API_KEY`.
    pub fn from_config(config: &AssistConfig) -> Result<Self> {
        let backend = match config.provider.as_str() {
            "openai" => Backend::OpenAI,
            "ollama" => Backend::Ollama,
            other => bail!("'{}' is not a chat provider", other),
        };
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("model required for {} provider", config.provider))?;

        let api_key = match backend {
            Backend::OpenAI => Some(
                std::env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?,
            ),
            Backend::Ollama => None,
        };

        let default_url = match backend {
            Backend::OpenAI => OPENAI_DEFAULT_URL,
            Backend::Ollama => OLLAMA_DEFAULT_URL,
        };
        let url = config
            .url
            .as_deref()
            .unwrap_or(default_url)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            backend,
            model,
            url,
            api_key,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system + user exchange and return the assistant's text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages = serde_json::json!([
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ]);

        let request = match self.backend {
            Backend::OpenAI => {
                let body = serde_json::json!({
                    "model": self.model,
                    "messages": messages,
                    "temperature": 0,
                });
                let mut req = self
                    .client
                    .post(format!("{}/v1/chat/completions", self.url))
                    .json(&body);
                if let Some(key) = &self.api_key {
                    req = req.header("Authorization", format!("Bearer {}", key));
                }
                req
            }
            Backend::Ollama => {
                let body = serde_json::json!({
                    "model": self.model,
                    "messages": messages,
                    "stream": false,
                });
                self.client.post(format!("{}/api/chat", self.url)).json(&body)
            }
        };

        let response = request.send().await.map_err(|e| match self.backend {
            Backend::Ollama => anyhow!(
                "Ollama connection error (is Ollama running at {}?): {}",
                self.url,
                e
            ),
            Backend::OpenAI => e.into(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("chat API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        match self.backend {
            Backend::OpenAI => parse_openai_chat_response(&json),
            Backend::Ollama => parse_ollama_chat_response(&json),
        }
    }
}

/// Extract `choices[0].message.content`.
fn parse_openai_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

/// Extract `message.content`.
fn parse_ollama_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_openai_chat_response() {
        let doc = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "[2, 0]"}}]
        });
        assert_eq!(parse_openai_chat_response(&doc).unwrap(), "[2, 0]");
        assert!(parse_openai_chat_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_parse_ollama_chat_response() {
        let doc = json!({"model": "llama3.2", "message": {"role": "assistant", "content": "rust tutorial"}, "done": true});
        assert_eq!(parse_ollama_chat_response(&doc).unwrap(), "rust tutorial");
        assert!(parse_ollama_chat_response(&json!({"done": true})).is_err());
    }

    #[test]
    fn test_ollama_client_defaults_url() {
        let cfg = AssistConfig {
            provider: "ollama".to_string(),
            model: Some("llama3.2".to_string()),
            url: None,
        };
        let client = ChatClient::from_config(&cfg).unwrap();
        assert_eq!(client.url, OLLAMA_DEFAULT_URL);
        assert_eq!(client.model(), "llama3.2");
    }

    #[test]
    fn test_rejects_non_chat_provider() {
        let cfg = AssistConfig {
            provider: "keyword".to_string(),
            model: None,
            url: None,
        };
        assert!(ChatClient::from_config(&cfg).is_err());
    }
}
