use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use media_insight::caption::CaptionService;
use media_insight::config::TranscriptionConfig;
use media_insight::runner::{
    ChannelObserver, JobError, JobEvent, JobStatus, JobStep, MediaJobRunner, NoOpObserver,
    PollFailure, PollPolicy, Stage,
};
use media_insight::summary::{Summarizer, SummaryError};
use media_insight::transcription::{
    AssemblyAiClient, RemoteJobId, RemoteStatus, SubmitOptions, TranscriptStatus,
    TranscriptionService, UploadedObject, Utterance,
};
use media_insight::{MediaFile, ServiceError};

type StatusReply = Result<TranscriptStatus, ServiceError>;

/// Scripted transcription service. Once the script runs dry every query
/// reports `processing`.
#[derive(Default)]
struct FakeTranscription {
    calls: Mutex<Vec<&'static str>>,
    statuses: Mutex<VecDeque<StatusReply>>,
    upload_error: Option<ServiceError>,
    submit_error: Option<ServiceError>,
    cancel_on_status: Option<(usize, CancellationToken)>,
}

impl FakeTranscription {
    fn scripted(statuses: Vec<StatusReply>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn status_calls(&self) -> usize {
        self.calls().iter().filter(|c| **c == "status").count()
    }
}

#[async_trait]
impl TranscriptionService for FakeTranscription {
    async fn upload(&self, _file: &MediaFile) -> Result<UploadedObject, ServiceError> {
        self.calls.lock().unwrap().push("upload");
        match &self.upload_error {
            Some(e) => Err(e.clone()),
            None => Ok(UploadedObject {
                url: "https://cdn.test/upload/1".to_string(),
            }),
        }
    }

    async fn submit(
        &self,
        object: &UploadedObject,
        options: &SubmitOptions,
    ) -> Result<RemoteJobId, ServiceError> {
        assert_eq!(object.url, "https://cdn.test/upload/1");
        assert!(options.speaker_labels);
        self.calls.lock().unwrap().push("submit");
        match &self.submit_error {
            Some(e) => Err(e.clone()),
            None => Ok(RemoteJobId("tx-42".to_string())),
        }
    }

    async fn status(&self, id: &RemoteJobId) -> Result<TranscriptStatus, ServiceError> {
        assert_eq!(id.0, "tx-42");
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push("status");
            calls.iter().filter(|c| **c == "status").count()
        };
        if let Some((at, token)) = &self.cancel_on_status {
            if *at == count {
                token.cancel();
            }
        }

        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TranscriptStatus::pending(RemoteStatus::Processing)))
    }

    fn name(&self) -> &str {
        "fake-transcription"
    }
}

struct FakeCaption {
    calls: Mutex<usize>,
}

#[async_trait]
impl CaptionService for FakeCaption {
    async fn caption(&self, image: &MediaFile) -> Result<String, ServiceError> {
        assert_eq!(image.mime_type, "image/png");
        *self.calls.lock().unwrap() += 1;
        Ok("a cat sleeping on a red mat".to_string())
    }

    fn name(&self) -> &str {
        "fake-caption"
    }
}

#[derive(Default)]
struct FakeSummarizer {
    fail: bool,
    /// Cancel this token, then hang until the runner gives up
    cancel: Option<CancellationToken>,
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        if let Some(token) = &self.cancel {
            token.cancel();
            return std::future::pending().await;
        }
        if self.fail {
            Err(SummaryError::Service(ServiceError::Http {
                status: 500,
                body: "model overloaded".to_string(),
            }))
        } else {
            Ok(format!("summary of {} chars", text.len()))
        }
    }

    fn name(&self) -> &str {
        "fake-summary"
    }
}

struct Harness {
    transcription: Arc<FakeTranscription>,
    caption: Arc<FakeCaption>,
    runner: MediaJobRunner,
}

fn harness(transcription: FakeTranscription, summary_fails: bool, max_attempts: u32) -> Harness {
    harness_with(
        transcription,
        FakeSummarizer {
            fail: summary_fails,
            ..Default::default()
        },
        PollPolicy::fixed(Duration::from_millis(1), max_attempts),
    )
}

fn harness_with(
    transcription: FakeTranscription,
    summarizer: FakeSummarizer,
    policy: PollPolicy,
) -> Harness {
    let transcription = Arc::new(transcription);
    let caption = Arc::new(FakeCaption {
        calls: Mutex::new(0),
    });
    let runner = MediaJobRunner::new(
        transcription.clone(),
        caption.clone(),
        Arc::new(summarizer),
        policy,
        SubmitOptions {
            speaker_labels: true,
            language_code: None,
        },
    );
    Harness {
        transcription,
        caption,
        runner,
    }
}

fn audio() -> MediaFile {
    MediaFile::new("meeting.mp3", "audio/mpeg", vec![7u8; 64])
}

fn finished_transcript() -> StatusReply {
    Ok(TranscriptStatus::completed(
        "Hello there. General Kenobi.",
        vec![
            Utterance {
                speaker: "A".to_string(),
                text: "Hello there.".to_string(),
            },
            Utterance {
                speaker: "B".to_string(),
                text: "General Kenobi.".to_string(),
            },
        ],
    ))
}

#[tokio::test]
async fn uploads_then_submits_then_polls_until_completed() {
    let h = harness(
        FakeTranscription::scripted(vec![
            Ok(TranscriptStatus::pending(RemoteStatus::Queued)),
            Ok(TranscriptStatus::pending(RemoteStatus::Processing)),
            finished_transcript(),
        ]),
        false,
        10,
    );

    let job = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        h.transcription.calls(),
        vec!["upload", "submit", "status", "status", "status"]
    );
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.id, Some(RemoteJobId("tx-42".to_string())));
    assert_eq!(job.result_text(), Some("Hello there. General Kenobi."));
    assert_eq!(
        job.diarized_text(),
        "Speaker A: Hello there.\nSpeaker B: General Kenobi."
    );
    assert_eq!(job.summary_text.as_deref(), Some("summary of 28 chars"));
    assert!(job.summary_error.is_none());
    assert!(job.finished_at.is_some());
    assert!(job.source().is_none());
}

#[tokio::test]
async fn never_completing_job_stops_at_attempt_cap() {
    let h = harness(FakeTranscription::default(), false, 5);

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Poll);
    assert_matches!(
        failure.error,
        JobError::Poll(PollFailure::AttemptsExhausted { attempts: 5 })
    );
    assert_eq!(h.transcription.status_calls(), 5);
    assert_eq!(failure.job.map(|j| j.status()), Some(JobStatus::Failed));
}

#[tokio::test]
async fn summary_failure_keeps_completed_transcript() {
    let h = harness(
        FakeTranscription::scripted(vec![finished_transcript()]),
        true,
        10,
    );

    let job = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.result_text(), Some("Hello there. General Kenobi."));
    assert_eq!(job.speaker_segments.len(), 2);
    assert!(job.summary_text.is_none());
    let error = job.summary_error.unwrap();
    assert!(error.contains("model overloaded"), "got {}", error);
}

#[tokio::test]
async fn missing_or_empty_file_is_rejected_without_remote_calls() {
    let h = harness(FakeTranscription::default(), false, 3);

    let failure = h
        .runner
        .run(None, &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(failure.step, JobStep::Validate);
    assert_matches!(failure.error, JobError::Validation(_));
    assert!(failure.job.is_none());

    let empty = MediaFile::new("silence.wav", "audio/wav", Vec::new());
    let failure = h
        .runner
        .run(Some(empty), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(failure.error, JobError::Validation(_));

    let text = MediaFile::new("notes.txt", "text/plain", b"hello".to_vec());
    let failure = h
        .runner
        .run(Some(text), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(failure.error, JobError::Validation(_));

    assert!(h.transcription.calls().is_empty());
}

#[tokio::test]
async fn cancellation_before_upload_makes_no_remote_calls() {
    let h = harness(FakeTranscription::default(), false, 3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &cancel)
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Upload);
    assert_matches!(failure.error, JobError::Cancelled);
    assert!(h.transcription.calls().is_empty());
    assert_eq!(failure.job.map(|j| j.status()), Some(JobStatus::Failed));
}

#[tokio::test]
async fn cancellation_during_polling_stops_the_loop() {
    let cancel = CancellationToken::new();
    let h = harness(
        FakeTranscription {
            cancel_on_status: Some((2, cancel.clone())),
            ..Default::default()
        },
        false,
        100,
    );

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &cancel)
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Poll);
    assert_matches!(failure.error, JobError::Cancelled);
    assert_eq!(h.transcription.status_calls(), 2);
}

#[tokio::test]
async fn terminal_status_error_aborts_immediately() {
    let h = harness(
        FakeTranscription::scripted(vec![
            Err(ServiceError::Auth {
                status: 401,
                body: "invalid key".to_string(),
            }),
            finished_transcript(),
        ]),
        false,
        10,
    );

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        failure.error,
        JobError::Poll(PollFailure::Service(ServiceError::Auth { status: 401, .. }))
    );
    assert_eq!(h.transcription.status_calls(), 1);
}

#[tokio::test]
async fn transient_status_errors_are_retried() {
    let h = harness(
        FakeTranscription::scripted(vec![
            Err(ServiceError::Timeout),
            Err(ServiceError::RateLimited {
                body: "slow down".to_string(),
            }),
            Ok(TranscriptStatus::pending(RemoteStatus::Processing)),
            Err(ServiceError::Network("connection reset".to_string())),
            finished_transcript(),
        ]),
        false,
        10,
    );

    let job = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(h.transcription.status_calls(), 5);
}

#[tokio::test]
async fn consecutive_transient_errors_give_up_at_cap() {
    let h = harness(
        FakeTranscription::scripted(vec![
            Err(ServiceError::Timeout),
            Err(ServiceError::Timeout),
            Err(ServiceError::Http {
                status: 503,
                body: "unavailable".to_string(),
            }),
            finished_transcript(),
        ]),
        false,
        10,
    );

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        failure.error,
        JobError::Poll(PollFailure::TooManyTransient { consecutive: 3, .. })
    );
    assert_eq!(h.transcription.status_calls(), 3);
}

#[tokio::test]
async fn remote_error_status_fails_the_job() {
    let h = harness(
        FakeTranscription::scripted(vec![
            Ok(TranscriptStatus::pending(RemoteStatus::Processing)),
            Ok(TranscriptStatus::failed("audio file is corrupt")),
        ]),
        false,
        10,
    );

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        &failure.error,
        JobError::Poll(PollFailure::Remote(msg)) if msg == "audio file is corrupt"
    );
    let job = failure.job.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert!(job.result_text().is_none());
}

#[tokio::test]
async fn upload_failure_carries_status_and_body() {
    let h = harness(
        FakeTranscription {
            upload_error: Some(ServiceError::Http {
                status: 413,
                body: "file too large".to_string(),
            }),
            ..Default::default()
        },
        false,
        3,
    );

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Upload);
    assert_matches!(
        &failure.error,
        JobError::Upload { status: Some(413), body } if body == "file too large"
    );
    assert_eq!(h.transcription.calls(), vec!["upload"]);
}

#[tokio::test]
async fn image_is_described_and_summarized_without_polling() {
    let h = harness(FakeTranscription::default(), false, 3);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let image = MediaFile::new("cat.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);

    let job = h
        .runner
        .run(
            Some(image),
            &ChannelObserver::new(tx),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.result_text(), Some("a cat sleeping on a red mat"));
    assert!(job.speaker_segments.is_empty());
    assert!(job.summary_text.is_some());
    assert_eq!(*h.caption.calls.lock().unwrap(), 1);
    assert!(h.transcription.calls().is_empty());

    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            JobEvent::StatusChanged { to, .. } => assert_ne!(to, JobStatus::Polling),
            JobEvent::Stage(stage) => stages.push(stage),
            _ => {}
        }
    }
    assert_eq!(
        stages,
        vec![Stage::AnalyzingImage, Stage::GeneratingSummary, Stage::Complete]
    );
}

#[tokio::test]
async fn status_only_moves_forward() {
    let h = harness(
        FakeTranscription::scripted(vec![
            Ok(TranscriptStatus::pending(RemoteStatus::Queued)),
            finished_transcript(),
        ]),
        false,
        10,
    );
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    h.runner
        .run(
            Some(audio()),
            &ChannelObserver::new(tx),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut transitions = Vec::new();
    let mut stages = Vec::new();
    let mut polls = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            JobEvent::StatusChanged { from, to } => {
                assert!(to > from, "{:?} -> {:?}", from, to);
                transitions.push(to);
            }
            JobEvent::Stage(stage) => stages.push(stage),
            JobEvent::Polled { attempt, status } => polls.push((attempt, status)),
            JobEvent::Finished { status } => assert_eq!(status, JobStatus::Completed),
        }
    }

    assert_eq!(
        transitions,
        vec![
            JobStatus::Uploading,
            JobStatus::Submitted,
            JobStatus::Polling,
            JobStatus::Completed
        ]
    );
    assert_eq!(
        stages.iter().map(|s| s.label()).collect::<Vec<_>>(),
        vec![
            "Uploading file...",
            "Starting transcription...",
            "Processing audio...",
            "Generating summary...",
            "Complete!"
        ]
    );
    assert_eq!(
        polls,
        vec![(1, RemoteStatus::Queued), (2, RemoteStatus::Completed)]
    );
}

#[tokio::test]
async fn rejected_submission_stops_before_polling() {
    let h = harness(
        FakeTranscription {
            submit_error: Some(ServiceError::Http {
                status: 400,
                body: "audio_url is not reachable".to_string(),
            }),
            ..Default::default()
        },
        false,
        10,
    );

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Submit);
    assert_matches!(
        &failure.error,
        JobError::Submission(ServiceError::Http { status: 400, body })
            if body == "audio_url is not reachable"
    );
    assert_eq!(h.transcription.calls(), vec!["upload", "submit"]);
    let job = failure.job.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert!(job.id.is_none());
}

#[tokio::test]
async fn polling_stops_at_wall_clock_deadline() {
    let policy = PollPolicy {
        interval: Duration::from_millis(10),
        backoff_multiplier: 1.0,
        max_interval: Duration::from_millis(10),
        max_attempts: 1_000,
        deadline: Some(Duration::from_millis(25)),
        max_transient_errors: 3,
    };
    let h = harness_with(FakeTranscription::default(), FakeSummarizer::default(), policy);

    let failure = h
        .runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Poll);
    assert_matches!(
        failure.error,
        JobError::Poll(PollFailure::DeadlineExceeded(d)) if d == Duration::from_millis(25)
    );
    let polls = h.transcription.status_calls();
    assert!((1..=3).contains(&polls), "polled {} times", polls);
}

#[tokio::test]
async fn cancellation_during_summary_reports_error_stage() {
    let cancel = CancellationToken::new();
    let h = harness_with(
        FakeTranscription::scripted(vec![finished_transcript()]),
        FakeSummarizer {
            cancel: Some(cancel.clone()),
            ..Default::default()
        },
        PollPolicy::fixed(Duration::from_millis(1), 10),
    );
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let failure = h
        .runner
        .run(Some(audio()), &ChannelObserver::new(tx), &cancel)
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Summarize);
    assert_matches!(failure.error, JobError::Cancelled);
    let job = failure.job.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.result_text(), Some("Hello there. General Kenobi."));
    assert!(job.summary_text.is_none());
    assert!(job.summary_error.is_some());

    let mut stages = Vec::new();
    let mut finished = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            JobEvent::Stage(stage) => stages.push(stage),
            JobEvent::Finished { status } => finished.push(status),
            _ => {}
        }
    }
    assert_eq!(stages.last(), Some(&Stage::Failed));
    assert!(!stages.contains(&Stage::Complete));
    assert_eq!(finished, vec![JobStatus::Completed]);
}

/// Serve one canned HTTP response after reading the whole request
async fn serve_once(status_line: &'static str, body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn forbidden_upload_keeps_server_status_and_body() {
    let base_url = serve_once("403 Forbidden", "key revoked").await;
    let config = TranscriptionConfig {
        base_url,
        api_key: Some("revoked-key".to_string()),
        timeout_secs: 5,
        ..Default::default()
    };
    let runner = MediaJobRunner::new(
        Arc::new(AssemblyAiClient::new(&config)),
        Arc::new(FakeCaption {
            calls: Mutex::new(0),
        }),
        Arc::new(FakeSummarizer::default()),
        PollPolicy::fixed(Duration::from_millis(1), 3),
        SubmitOptions::default(),
    );

    let failure = runner
        .run(Some(audio()), &NoOpObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.step, JobStep::Upload);
    assert_matches!(
        &failure.error,
        JobError::Upload { status: Some(403), body } if body == "key revoked"
    );
}
