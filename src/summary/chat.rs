// src/summary/chat.rs
// OpenAI-compatible chat completions summarizer

use super::{SummaryError, Summarizer};
use crate::http::{build_client, ensure_success, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ~3000 tokens
const MAX_INPUT_CHARS: usize = 12_000;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
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
    content: String,
}

pub struct ChatSummarizer {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl ChatSummarizer {
    pub fn new(url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            url: url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn build_prompt(text: &str) -> String {
        let truncated: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let marker = if truncated.len() < text.len() {
            "...[TRUNCATED]"
        } else {
            ""
        };

        format!(
            "Summarize the following content in a few concise sentences. \
            Keep names, numbers and decisions. Do not invent anything.\n\n{}{}",
            truncated, marker
        )
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: Self::build_prompt(text),
            }],
            max_tokens: 512,
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ServiceError::from)?;

        let chat: ChatResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(ServiceError::from)?;

        chat.choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                SummaryError::Service(ServiceError::InvalidResponse("no choices".to_string()))
            })
    }

    fn name(&self) -> &str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_input_is_truncated_on_char_boundary() {
        let text = "é".repeat(MAX_INPUT_CHARS + 10);
        let prompt = ChatSummarizer::build_prompt(&text);
        assert!(prompt.ends_with("...[TRUNCATED]"));
        assert_eq!(prompt.matches('é').count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn short_input_is_kept_whole() {
        let prompt = ChatSummarizer::build_prompt("meeting notes");
        assert!(prompt.ends_with("meeting notes"));
    }
}
