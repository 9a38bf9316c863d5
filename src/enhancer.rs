//! Query enhancement.
//!
//! An enhancer rewrites the caller's free text into something providers
//! match better (fixing typos, expanding abbreviations). It is best effort:
//! the aggregator bounds every call with a deadline and falls back to the
//! trimmed original query on failure, timeout, or blank output.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AssistConfig;
use crate::llm::ChatClient;

#[async_trait]
pub trait QueryEnhancer: Send + Sync {
    fn name(&self) -> &str;

    async fn enhance(&self, query: &str) -> Result<String>;
}

/// Returns the query unchanged. Used when `[enhancer] provider = "disabled"`.
pub struct PassthroughEnhancer;

#[async_trait]
impl QueryEnhancer for PassthroughEnhancer {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn enhance(&self, query: &str) -> Result<String> {
        Ok(query.to_string())
    }
}

const ENHANCE_PROMPT: &str = "You rewrite search queries for an online course catalogue. \
Fix spelling, expand abbreviations, and keep the user's intent. \
Reply with the rewritten query only, on a single line, without quotes or commentary.";

/// Enhancer backed by a chat-completion model.
pub struct ChatQueryEnhancer {
    client: ChatClient,
}

impl ChatQueryEnhancer {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryEnhancer for ChatQueryEnhancer {
    fn name(&self) -> &str {
        self.client.model()
    }

    async fn enhance(&self, query: &str) -> Result<String> {
        let reply = self.client.complete(ENHANCE_PROMPT, query).await?;
        Ok(clean_reply(&reply))
    }
}

/// First non-empty line of a model reply, stripped of wrapping quotes.
fn clean_reply(reply: &str) -> String {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    line.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

pub fn create_enhancer(config: &AssistConfig) -> Result<Arc<dyn QueryEnhancer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(PassthroughEnhancer)),
        "openai" | "ollama" => Ok(Arc::new(ChatQueryEnhancer::new(ChatClient::from_config(
            config,
        )?))),
        other => anyhow::bail!("Unknown enhancer provider: {}", other),
    }
}
