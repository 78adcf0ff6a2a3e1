pub mod caption;
pub mod config;
pub mod credentials;
pub mod http;
pub mod media;
pub mod model;
pub mod runner;
pub mod summary;
pub mod telemetry;
pub mod transcription;

pub use config::AppConfig;
pub use http::ServiceError;
pub use media::{MediaFile, MediaKind};
pub use runner::{Job, JobError, JobFailure, JobStatus, MediaJobRunner, PollPolicy};
