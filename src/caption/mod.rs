// src/caption/mod.rs
// Caption Module - image description through a hosted vision model

mod huggingface;

pub use huggingface::HfCaptionClient;

use crate::http::ServiceError;
use crate::media::MediaFile;
use async_trait::async_trait;

/// Synchronous image-to-text service
#[async_trait]
pub trait CaptionService: Send + Sync {
    /// Describe the image in plain text
    async fn caption(&self, image: &MediaFile) -> Result<String, ServiceError>;

    /// Get provider name
    fn name(&self) -> &str;
}
