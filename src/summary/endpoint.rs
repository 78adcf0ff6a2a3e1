// src/summary/endpoint.rs
// Plain `{text} -> {summary}` HTTP endpoint

use super::{SummaryError, Summarizer};
use crate::http::{build_client, ensure_success, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct SummaryRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct SummaryResponse {
    pub summary: Option<String>,
}

impl SummaryResponse {
    pub(crate) fn into_summary(self) -> Result<String, SummaryError> {
        self.summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SummaryError::Service(ServiceError::InvalidResponse("missing summary".to_string()))
            })
    }
}

pub struct EndpointSummarizer {
    client: Client,
    url: String,
}

impl EndpointSummarizer {
    pub fn new(url: &str, timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Summarizer for EndpointSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SummaryRequest { text })
            .send()
            .await
            .map_err(ServiceError::from)?;

        let body: SummaryResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(ServiceError::from)?;

        body.into_summary()
    }

    fn name(&self) -> &str {
        "endpoint"
    }
}
