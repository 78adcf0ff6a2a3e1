use crate::media::{MediaFile, MediaKind};
use crate::transcription::{RemoteJobId, Utterance};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of a [`Job`]. Ordered: a job only ever moves to a later variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum JobStatus {
    Queued,
    Uploading,
    Submitted,
    Polling,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot move job from {from:?} to {to:?}")]
    Backwards { from: JobStatus, to: JobStatus },

    #[error("job already finished as {0:?}")]
    Terminal(JobStatus),

    #[error("result text already set")]
    ResultAlreadySet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeakerSegment {
    pub speaker_label: String,
    pub text: String,
}

impl From<Utterance> for SpeakerSegment {
    fn from(u: Utterance) -> Self {
        Self {
            speaker_label: u.speaker,
            text: u.text,
        }
    }
}

/// One user-submitted file and everything derived from it so far
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub run_id: Uuid,
    pub id: Option<RemoteJobId>,
    pub kind: MediaKind,
    pub file_name: String,
    pub mime_type: String,
    status: JobStatus,
    #[serde(skip)]
    source: Option<MediaFile>,
    result_text: Option<String>,
    pub speaker_segments: Vec<SpeakerSegment>,
    pub summary_text: Option<String>,
    pub summary_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(source: MediaFile, kind: MediaKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            id: None,
            kind,
            file_name: source.name.clone(),
            mime_type: source.mime_type.clone(),
            status: JobStatus::Queued,
            source: Some(source),
            result_text: None,
            speaker_segments: Vec::new(),
            summary_text: None,
            summary_error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// The payload, available until the job reaches a terminal state
    pub fn source(&self) -> Option<&MediaFile> {
        self.source.as_ref()
    }

    pub fn result_text(&self) -> Option<&str> {
        self.result_text.as_deref()
    }

    /// Move forward to `next`; `Failed` is reachable from any live status
    pub fn advance(&mut self, next: JobStatus) -> Result<JobStatus, TransitionError> {
        let from = self.status;
        if from.is_terminal() {
            return Err(TransitionError::Terminal(from));
        }
        if next != JobStatus::Failed && next <= from {
            return Err(TransitionError::Backwards { from, to: next });
        }

        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
            self.source = None;
        }
        Ok(from)
    }

    pub fn set_result(
        &mut self,
        text: String,
        segments: Vec<SpeakerSegment>,
    ) -> Result<(), TransitionError> {
        if self.result_text.is_some() {
            return Err(TransitionError::ResultAlreadySet);
        }
        self.result_text = Some(text);
        self.speaker_segments = segments;
        Ok(())
    }

    /// `Speaker A: ...` lines, one per utterance
    pub fn diarized_text(&self) -> String {
        self.speaker_segments
            .iter()
            .map(|s| format!("Speaker {}: {}", s.speaker_label, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
