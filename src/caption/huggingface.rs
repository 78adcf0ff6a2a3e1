// src/caption/huggingface.rs
// Hugging Face inference adapter for image captioning

use super::CaptionService;
use crate::config::CaptionConfig;
use crate::http::{build_client, ensure_success, ServiceError};
use crate::media::MediaFile;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: String,
}

/// The inference API answers with either a list or a single object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CaptionResponse {
    Many(Vec<Generated>),
    One(Generated),
}

impl CaptionResponse {
    fn into_text(self) -> Option<String> {
        match self {
            CaptionResponse::Many(items) => items.into_iter().next().map(|g| g.generated_text),
            CaptionResponse::One(item) => Some(item.generated_text),
        }
    }
}

pub struct HfCaptionClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HfCaptionClient {
    pub fn new(config: &CaptionConfig) -> Self {
        tracing::info!("Caption adapter initialized: {}", config.endpoint);

        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            client: build_client(config.timeout_secs),
        }
    }

    fn parse(body: &str) -> Result<String, ServiceError> {
        let parsed: CaptionResponse = serde_json::from_str(body)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        let text = parsed
            .into_text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::InvalidResponse("empty caption".to_string()))?;
        Ok(text)
    }
}

#[async_trait]
impl CaptionService for HfCaptionClient {
    async fn caption(&self, image: &MediaFile) -> Result<String, ServiceError> {
        tracing::info!("Caption: describing {} ({} bytes)", image.name, image.len());

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", &image.mime_type)
            .body(image.bytes.clone());

        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let resp = ensure_success(request.send().await?).await?;
        let body = resp.text().await?;
        Self::parse(&body)
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}
