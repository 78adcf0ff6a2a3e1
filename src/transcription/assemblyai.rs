// src/transcription/assemblyai.rs
// AssemblyAI transcription adapter

use super::{
    RemoteJobId, SubmitOptions, TranscriptStatus, TranscriptionService, UploadedObject,
};
use crate::config::TranscriptionConfig;
use crate::http::{build_client, ensure_success, ServiceError};
use crate::media::MediaFile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
    speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranscriptCreated {
    id: String,
}

pub struct AssemblyAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AssemblyAiClient {
    pub fn new(config: &TranscriptionConfig) -> Self {
        let client = build_client(config.timeout_secs);

        tracing::info!("AssemblyAI adapter initialized: {}", config.base_url);

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl TranscriptionService for AssemblyAiClient {
    async fn upload(&self, file: &MediaFile) -> Result<UploadedObject, ServiceError> {
        tracing::info!(
            "AssemblyAI: uploading {} ({} bytes)",
            file.name,
            file.len()
        );

        let resp = self
            .client
            .post(self.url("upload"))
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(file.bytes.clone())
            .send()
            .await?;

        let uploaded: UploadResponse = ensure_success(resp).await?.json().await?;
        Ok(UploadedObject {
            url: uploaded.upload_url,
        })
    }

    async fn submit(
        &self,
        object: &UploadedObject,
        options: &SubmitOptions,
    ) -> Result<RemoteJobId, ServiceError> {
        let request = TranscriptRequest {
            audio_url: &object.url,
            speaker_labels: options.speaker_labels,
            language_code: options.language_code.as_deref(),
        };

        let resp = self
            .client
            .post(self.url("transcript"))
            .header("authorization", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let created: TranscriptCreated = ensure_success(resp).await?.json().await?;
        if created.id.trim().is_empty() {
            return Err(ServiceError::InvalidResponse("empty transcript id".to_string()));
        }

        tracing::info!("AssemblyAI: transcript {} submitted", created.id);
        Ok(RemoteJobId(created.id))
    }

    async fn status(&self, id: &RemoteJobId) -> Result<TranscriptStatus, ServiceError> {
        let resp = self
            .client
            .get(self.url(&format!("transcript/{}", id)))
            .header("authorization", &self.api_key)
            .send()
            .await?;

        let status: TranscriptStatus = ensure_success(resp).await?.json().await?;
        Ok(status)
    }

    fn name(&self) -> &str {
        "AssemblyAI"
    }
}
