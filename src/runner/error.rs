use super::job::{Job, TransitionError};
use crate::http::ServiceError;
use crate::model::ModelLoadError;
use crate::summary::SummaryError;
use std::time::Duration;
use thiserror::Error;

/// Step of the workflow at which a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStep {
    Validate,
    Upload,
    Submit,
    Poll,
    Extract,
    Summarize,
}

impl std::fmt::Display for JobStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStep::Validate => "validate",
            JobStep::Upload => "upload",
            JobStep::Submit => "submit",
            JobStep::Poll => "poll",
            JobStep::Extract => "extract",
            JobStep::Summarize => "summarize",
        };
        f.write_str(name)
    }
}

/// Why the poll loop gave up
#[derive(Debug, Clone, Error)]
pub enum PollFailure {
    #[error("remote job failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Service(ServiceError),

    #[error("gave up after {consecutive} consecutive transient errors, last: {last}")]
    TooManyTransient { consecutive: u32, last: ServiceError },

    #[error("job not finished after {attempts} status queries")]
    AttemptsExhausted { attempts: u32 },

    #[error("job not finished within {0:?}")]
    DeadlineExceeded(Duration),
}

#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload failed (status {status:?}): {body}")]
    Upload { status: Option<u16>, body: String },

    #[error("Submission failed: {0}")]
    Submission(ServiceError),

    #[error("Polling failed: {0}")]
    Poll(PollFailure),

    #[error("Result could not be read: {0}")]
    Extract(String),

    #[error("Summary failed: {0}")]
    Summary(SummaryError),

    #[error(transparent)]
    ModelLoad(ModelLoadError),

    #[error("Invalid job transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Cancelled")]
    Cancelled,
}

impl JobError {
    pub(crate) fn upload(e: ServiceError) -> Self {
        JobError::Upload {
            status: e.status(),
            body: e.body(),
        }
    }
}

impl From<SummaryError> for JobError {
    fn from(e: SummaryError) -> Self {
        match e {
            SummaryError::ModelLoad(inner) => JobError::ModelLoad(inner),
            other => JobError::Summary(other),
        }
    }
}

/// Terminal failure of a run: where, why, and whatever had been built so far
#[derive(Debug, Error)]
#[error("{step} failed: {error}")]
pub struct JobFailure {
    pub step: JobStep,
    #[source]
    pub error: JobError,
    pub job: Option<Job>,
}
