// src/summary/mod.rs
// Summary Module - Summarizer trait + failover orchestrator

mod chat;
pub mod document;
mod endpoint;
mod extractive;

pub use chat::ChatSummarizer;
pub use document::{DocumentSummarizer, SummarizeSource};
pub use endpoint::EndpointSummarizer;
pub use extractive::{ExtractiveSummarizer, StopwordModel};

use crate::config::SummaryConfig;
use crate::http::ServiceError;
use crate::model::ModelLoadError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SummaryError {
    #[error("Nothing to summarize")]
    EmptyInput,

    #[error("Cannot extract text from {0}")]
    UnsupportedInput(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error("No summary providers configured")]
    NoProviders,

    #[error("All summary providers failed: {0}")]
    AllProvidersFailed(String),
}

/// Trait for text summarization adapters
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Condense `text` into a short summary
    async fn summarize(&self, text: &str) -> Result<String, SummaryError>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Summarizer with sequential failover across providers
pub struct SummaryOrchestrator {
    providers: Vec<Box<dyn Summarizer>>,
}

impl SummaryOrchestrator {
    pub fn new(providers: Vec<Box<dyn Summarizer>>) -> Self {
        Self { providers }
    }

    /// Build the provider chain from configuration
    pub fn from_config(config: &SummaryConfig) -> Self {
        let mut providers: Vec<Box<dyn Summarizer>> = Vec::new();

        // 1. Dedicated summary endpoint
        if let Some(url) = config.endpoint.as_deref() {
            providers.push(Box::new(EndpointSummarizer::new(url, config.timeout_secs)));
            tracing::info!("Summary: endpoint adapter loaded");
        }

        // 2. Chat completions
        if let Some(key) = config.chat_api_key.as_deref() {
            providers.push(Box::new(ChatSummarizer::new(
                &config.chat_url,
                key,
                &config.chat_model,
                config.timeout_secs,
            )));
            tracing::info!("Summary: chat adapter loaded ({})", config.chat_model);
        }

        // 3. Local extractive fallback
        if config.extractive_fallback {
            providers.push(Box::new(ExtractiveSummarizer::new(
                config.stopwords_path.clone(),
                config.max_sentences,
            )));
            tracing::info!("Summary: extractive fallback loaded");
        }

        tracing::info!("Summary orchestrator: {} providers available", providers.len());

        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl Summarizer for SummaryOrchestrator {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        if text.trim().is_empty() {
            return Err(SummaryError::EmptyInput);
        }
        if self.providers.is_empty() {
            return Err(SummaryError::NoProviders);
        }

        let mut failures = Vec::new();

        for provider in &self.providers {
            tracing::info!("Summary: trying provider '{}'...", provider.name());

            match provider.summarize(text).await {
                Ok(summary) => {
                    tracing::info!(
                        "Summary: '{}' succeeded ({} chars)",
                        provider.name(),
                        summary.len()
                    );
                    return Ok(summary);
                }
                Err(e) => {
                    tracing::warn!("Summary: '{}' failed: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        tracing::error!("Summary: all providers failed");
        Err(SummaryError::AllProvidersFailed(failures.join("; ")))
    }

    fn name(&self) -> &str {
        "failover"
    }
}
