use crate::caption::{CaptionService, HfCaptionClient};
use crate::config::AppConfig;
use crate::media::{MediaFile, MediaKind};
use crate::summary::{Summarizer, SummaryOrchestrator};
use crate::transcription::{
    AssemblyAiClient, RemoteJobId, RemoteStatus, SubmitOptions, TranscriptStatus,
    TranscriptionService,
};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

pub use self::error::{JobError, JobFailure, JobStep, PollFailure};
pub use self::job::{Job, JobStatus, SpeakerSegment, TransitionError};
pub use self::progress::{
    ChannelObserver, JobEvent, JobObserver, NoOpObserver, Stage, TracingObserver,
};
pub use self::retry::PollPolicy;

pub mod error;
pub mod job;
pub mod progress;
pub mod retry;

type StepResult<T> = Result<T, (JobStep, JobError)>;

/// Drives one file through upload, submission, polling, extraction and summary
pub struct MediaJobRunner {
    transcription: Arc<dyn TranscriptionService>,
    caption: Arc<dyn CaptionService>,
    summarizer: Arc<dyn Summarizer>,
    policy: PollPolicy,
    submit_options: SubmitOptions,
}

impl MediaJobRunner {
    pub fn new(
        transcription: Arc<dyn TranscriptionService>,
        caption: Arc<dyn CaptionService>,
        summarizer: Arc<dyn Summarizer>,
        policy: PollPolicy,
        submit_options: SubmitOptions,
    ) -> Self {
        Self {
            transcription,
            caption,
            summarizer,
            policy,
            submit_options,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        if config.transcription.api_key.is_none() {
            tracing::warn!("Transcription API key missing, uploads will be rejected");
        }

        Self::new(
            Arc::new(AssemblyAiClient::new(&config.transcription)),
            Arc::new(HfCaptionClient::new(&config.caption)),
            Arc::new(SummaryOrchestrator::from_config(&config.summary)),
            PollPolicy::from_config(&config.poll),
            SubmitOptions {
                speaker_labels: config.transcription.speaker_labels,
                language_code: config.transcription.language_code.clone(),
            },
        )
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Run without external cancellation
    pub async fn analyze(
        &self,
        file: MediaFile,
        observer: &dyn JobObserver,
    ) -> Result<Job, JobFailure> {
        self.run(Some(file), observer, &CancellationToken::new()).await
    }

    /// Process `file` to a terminal state.
    ///
    /// A failed summary does not fail the run: the job comes back `Completed`
    /// with `summary_error` set and the transcript intact.
    pub async fn run(
        &self,
        file: Option<MediaFile>,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> Result<Job, JobFailure> {
        let (file, kind) = match validate(file) {
            Ok(valid) => valid,
            Err(error) => {
                tracing::warn!("Rejected input: {}", error);
                observer.on_event(&JobEvent::Stage(Stage::Failed));
                return Err(JobFailure {
                    step: JobStep::Validate,
                    error,
                    job: None,
                });
            }
        };

        let mut job = Job::new(file, kind);
        tracing::info!(
            "Job {} started: {} ({}, {} bytes)",
            job.run_id,
            job.file_name,
            job.mime_type,
            job.source().map(MediaFile::len).unwrap_or_default()
        );

        let extracted = match kind {
            MediaKind::Audio => self.transcribe(&mut job, observer, cancel).await,
            MediaKind::Image => self.describe(&mut job, observer, cancel).await,
            MediaKind::Text => Err((
                JobStep::Validate,
                JobError::Validation("text files are summarized, not analyzed".to_string()),
            )),
        };

        if let Err((step, error)) = extracted {
            return Err(self.fail(job, step, error, observer));
        }

        if let Err(error) = self.summarize(&mut job, observer, cancel).await {
            tracing::warn!("Job {} summary failed: {}", job.run_id, error);
            job.summary_error = Some(error.to_string());
            if matches!(error, JobError::Cancelled) {
                // Extraction already finished, so the job itself stays Completed
                observer.on_event(&JobEvent::Stage(Stage::Failed));
                observer.on_event(&JobEvent::Finished { status: job.status() });
                return Err(JobFailure {
                    step: JobStep::Summarize,
                    error,
                    job: Some(job),
                });
            }
        }

        observer.on_event(&JobEvent::Stage(Stage::Complete));
        observer.on_event(&JobEvent::Finished { status: job.status() });
        tracing::info!("Job {} complete", job.run_id);
        Ok(job)
    }

    async fn transcribe(
        &self,
        job: &mut Job,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> StepResult<()> {
        // 1. Upload
        checkpoint(cancel).map_err(at(JobStep::Upload))?;
        advance(job, JobStatus::Uploading, observer).map_err(at(JobStep::Upload))?;
        observer.on_event(&JobEvent::Stage(Stage::Uploading));

        let object = {
            let file = source(job).map_err(at(JobStep::Upload))?;
            cancellable(cancel, self.transcription.upload(file))
                .await
                .map_err(at(JobStep::Upload))?
                .map_err(|e| (JobStep::Upload, JobError::upload(e)))?
        };
        tracing::info!("Job {} uploaded via {}", job.run_id, self.transcription.name());

        // 2. Submit
        checkpoint(cancel).map_err(at(JobStep::Submit))?;
        observer.on_event(&JobEvent::Stage(Stage::StartingTranscription));
        let remote_id = cancellable(cancel, self.transcription.submit(&object, &self.submit_options))
            .await
            .map_err(at(JobStep::Submit))?
            .map_err(|e| (JobStep::Submit, JobError::Submission(e)))?;
        job.id = Some(remote_id.clone());
        advance(job, JobStatus::Submitted, observer).map_err(at(JobStep::Submit))?;

        // 3. Poll
        advance(job, JobStatus::Polling, observer).map_err(at(JobStep::Poll))?;
        observer.on_event(&JobEvent::Stage(Stage::ProcessingAudio));
        let finished = self
            .poll(&remote_id, observer, cancel)
            .await
            .map_err(at(JobStep::Poll))?;

        // 4. Extract
        let text = finished.text.ok_or_else(|| {
            (
                JobStep::Extract,
                JobError::Extract("completed job carried no text".to_string()),
            )
        })?;
        let segments = finished
            .utterances
            .unwrap_or_default()
            .into_iter()
            .map(SpeakerSegment::from)
            .collect::<Vec<_>>();
        job.set_result(text, segments)
            .map_err(|e| (JobStep::Extract, JobError::from(e)))?;
        advance(job, JobStatus::Completed, observer).map_err(at(JobStep::Extract))?;

        tracing::info!(
            "Job {} transcribed: {} chars, {} utterances",
            job.run_id,
            job.result_text().map(str::len).unwrap_or_default(),
            job.speaker_segments.len()
        );
        Ok(())
    }

    async fn describe(
        &self,
        job: &mut Job,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> StepResult<()> {
        checkpoint(cancel).map_err(at(JobStep::Upload))?;
        advance(job, JobStatus::Uploading, observer).map_err(at(JobStep::Upload))?;
        observer.on_event(&JobEvent::Stage(Stage::AnalyzingImage));

        let description = {
            let file = source(job).map_err(at(JobStep::Upload))?;
            cancellable(cancel, self.caption.caption(file))
                .await
                .map_err(at(JobStep::Upload))?
                .map_err(|e| (JobStep::Upload, JobError::upload(e)))?
        };
        advance(job, JobStatus::Submitted, observer).map_err(at(JobStep::Submit))?;

        job.set_result(description, Vec::new())
            .map_err(|e| (JobStep::Extract, JobError::from(e)))?;
        advance(job, JobStatus::Completed, observer).map_err(at(JobStep::Extract))?;

        tracing::info!("Job {} described via {}", job.run_id, self.caption.name());
        Ok(())
    }

    /// Query the job status until it is terminal or the policy runs out
    async fn poll(
        &self,
        id: &RemoteJobId,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> Result<TranscriptStatus, JobError> {
        let started = Instant::now();
        let mut consecutive_failures = 0u32;

        for attempt in 0..self.policy.max_attempts {
            let delay = self.policy.delay_for(attempt);
            if let Some(deadline) = self.policy.deadline {
                if started.elapsed() + delay > deadline {
                    return Err(JobError::Poll(PollFailure::DeadlineExceeded(deadline)));
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                _ = sleep(delay) => {}
            }

            match cancellable(cancel, self.transcription.status(id)).await? {
                Ok(status) => {
                    consecutive_failures = 0;
                    observer.on_event(&JobEvent::Polled {
                        attempt: attempt + 1,
                        status: status.status,
                    });

                    match status.status {
                        RemoteStatus::Completed => return Ok(status),
                        RemoteStatus::Error => {
                            let message = status
                                .error
                                .unwrap_or_else(|| "unknown error".to_string());
                            return Err(JobError::Poll(PollFailure::Remote(message)));
                        }
                        RemoteStatus::Queued | RemoteStatus::Processing => {
                            tracing::debug!(
                                "Job {} still {} (attempt {}/{})",
                                id,
                                status.status.as_str(),
                                attempt + 1,
                                self.policy.max_attempts
                            );
                        }
                    }
                }
                Err(e) => {
                    if !e.is_transient() {
                        tracing::error!("Job {} status query failed: {}", id, e);
                        return Err(JobError::Poll(PollFailure::Service(e)));
                    }

                    consecutive_failures += 1;
                    tracing::warn!(
                        "Job {} status query failed ({} in a row): {}",
                        id,
                        consecutive_failures,
                        e
                    );
                    if !self.policy.should_retry(consecutive_failures, &e) {
                        return Err(JobError::Poll(PollFailure::TooManyTransient {
                            consecutive: consecutive_failures,
                            last: e,
                        }));
                    }
                }
            }
        }

        Err(JobError::Poll(PollFailure::AttemptsExhausted {
            attempts: self.policy.max_attempts,
        }))
    }

    async fn summarize(
        &self,
        job: &mut Job,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        checkpoint(cancel)?;
        let text = match job.result_text() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => {
                return Err(JobError::Summary(crate::summary::SummaryError::EmptyInput));
            }
        };

        observer.on_event(&JobEvent::Stage(Stage::GeneratingSummary));
        let summary = cancellable(cancel, self.summarizer.summarize(&text)).await??;
        job.summary_text = Some(summary);
        Ok(())
    }

    fn fail(
        &self,
        mut job: Job,
        step: JobStep,
        error: JobError,
        observer: &dyn JobObserver,
    ) -> JobFailure {
        tracing::error!("Job {} failed at {}: {}", job.run_id, step, error);

        if !job.status().is_terminal() {
            let _ = advance(&mut job, JobStatus::Failed, observer);
        }
        observer.on_event(&JobEvent::Stage(Stage::Failed));
        observer.on_event(&JobEvent::Finished { status: job.status() });

        JobFailure {
            step,
            error,
            job: Some(job),
        }
    }
}

fn validate(file: Option<MediaFile>) -> Result<(MediaFile, MediaKind), JobError> {
    let file = file.ok_or_else(|| JobError::Validation("no file selected".to_string()))?;

    if file.is_empty() {
        return Err(JobError::Validation(format!("{} is empty", file.name)));
    }
    if file.mime_type.trim().is_empty() {
        return Err(JobError::Validation(format!(
            "{} has no content type",
            file.name
        )));
    }

    match file.kind() {
        Some(kind @ (MediaKind::Audio | MediaKind::Image)) => Ok((file, kind)),
        _ => Err(JobError::Validation(format!(
            "unsupported content type {}",
            file.mime_type
        ))),
    }
}

fn source(job: &Job) -> Result<&MediaFile, JobError> {
    job.source()
        .ok_or_else(|| JobError::Validation("file already released".to_string()))
}

fn advance(job: &mut Job, next: JobStatus, observer: &dyn JobObserver) -> Result<(), JobError> {
    let from = job.advance(next)?;
    observer.on_event(&JobEvent::StatusChanged { from, to: next });
    Ok(())
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), JobError> {
    if cancel.is_cancelled() {
        Err(JobError::Cancelled)
    } else {
        Ok(())
    }
}

/// Await `fut` unless the token fires first
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, JobError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        out = fut => Ok(out),
    }
}

fn at(step: JobStep) -> impl Fn(JobError) -> (JobStep, JobError) {
    move |error| (step, error)
}
