// src/transcription/types.rs
// Transcription job types

use serde::{Deserialize, Serialize};

/// Reference to an object stored by the transcription service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    pub url: String,
}

/// Opaque job id assigned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteJobId(pub String);

impl std::fmt::Display for RemoteJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Ask the service to attribute utterances to speakers
    pub speaker_labels: bool,
    pub language_code: Option<String>,
}

/// Remote job state as reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl RemoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RemoteStatus::Queued => "queued",
            RemoteStatus::Processing => "processing",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Error => "error",
        }
    }
}

/// One speaker-attributed utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
}

/// Body of a status query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptStatus {
    pub status: RemoteStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranscriptStatus {
    pub fn pending(status: RemoteStatus) -> Self {
        Self {
            status,
            text: None,
            utterances: None,
            error: None,
        }
    }

    pub fn completed(text: impl Into<String>, utterances: Vec<Utterance>) -> Self {
        Self {
            status: RemoteStatus::Completed,
            text: Some(text.into()),
            utterances: Some(utterances),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Error,
            text: None,
            utterances: None,
            error: Some(message.into()),
        }
    }
}
