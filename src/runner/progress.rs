//! Progress reporting for a running job.
//!
//! The runner emits a small set of events; observers decide whether to show
//! them to a user, log them, or forward them somewhere else.

use super::job::JobStatus;
use crate::transcription::RemoteStatus;
use tokio::sync::mpsc::UnboundedSender;

/// Human-facing stage of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Uploading,
    StartingTranscription,
    ProcessingAudio,
    AnalyzingImage,
    GeneratingSummary,
    Complete,
    Failed,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Uploading => "Uploading file...",
            Stage::StartingTranscription => "Starting transcription...",
            Stage::ProcessingAudio => "Processing audio...",
            Stage::AnalyzingImage => "Analyzing image...",
            Stage::GeneratingSummary => "Generating summary...",
            Stage::Complete => "Complete!",
            Stage::Failed => "Error occurred",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Events emitted while a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// A new user-visible stage began.
    Stage(Stage),

    /// The job moved forward in its lifecycle.
    StatusChanged { from: JobStatus, to: JobStatus },

    /// A status query returned. `attempt` counts from 1.
    Polled { attempt: u32, status: RemoteStatus },

    /// The run ended; `status` is `Completed` or `Failed`.
    Finished { status: JobStatus },
}

/// Trait for observing a run. Implement this for UI, logging, etc.
pub trait JobObserver: Send + Sync {
    fn on_event(&self, event: &JobEvent);
}

impl<F> JobObserver for F
where
    F: Fn(&JobEvent) + Send + Sync,
{
    fn on_event(&self, event: &JobEvent) {
        self(event)
    }
}

pub struct NoOpObserver;

impl JobObserver for NoOpObserver {
    #[inline(always)]
    fn on_event(&self, _event: &JobEvent) {}
}

/// Writes every event to the `tracing` log at debug level
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn on_event(&self, event: &JobEvent) {
        match event {
            JobEvent::Stage(stage) => tracing::debug!("stage: {}", stage),
            JobEvent::StatusChanged { from, to } => {
                tracing::debug!("status {:?} -> {:?}", from, to)
            }
            JobEvent::Polled { attempt, status } => {
                tracing::debug!("poll #{}: {}", attempt, status.as_str())
            }
            JobEvent::Finished { status } => tracing::debug!("finished as {:?}", status),
        }
    }
}

/// Forwards events over a channel; a closed receiver is ignored
pub struct ChannelObserver {
    tx: UnboundedSender<JobEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }
}

impl JobObserver for ChannelObserver {
    fn on_event(&self, event: &JobEvent) {
        let _ = self.tx.send(event.clone());
    }
}
