// src/transcription/mod.rs
// Transcription Module - remote speech-to-text with speaker labels

mod assemblyai;
mod types;

pub use assemblyai::AssemblyAiClient;
pub use types::{
    RemoteJobId, RemoteStatus, SubmitOptions, TranscriptStatus, UploadedObject, Utterance,
};

use crate::http::ServiceError;
use crate::media::MediaFile;
use async_trait::async_trait;

/// Upload / submit / status protocol of an asynchronous transcription service
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Store the raw file bytes remotely
    async fn upload(&self, file: &MediaFile) -> Result<UploadedObject, ServiceError>;

    /// Start a transcription job over an uploaded object
    async fn submit(
        &self,
        object: &UploadedObject,
        options: &SubmitOptions,
    ) -> Result<RemoteJobId, ServiceError>;

    /// Query the current state of a job
    async fn status(&self, id: &RemoteJobId) -> Result<TranscriptStatus, ServiceError>;

    /// Get provider name
    fn name(&self) -> &str;
}
