// src/summary/document.rs
// Summarize an uploaded document or a web page

use super::endpoint::SummaryResponse;
use super::{SummaryError, Summarizer};
use crate::http::{build_client, ensure_success, ServiceError};
use crate::media::{MediaFile, MediaKind};
use regex::Regex;
use reqwest::{multipart, Client};
use std::sync::OnceLock;

/// What the user handed to the summarizer
#[derive(Debug, Clone)]
pub enum SummarizeSource {
    File(MediaFile),
    Url(String),
}

pub struct DocumentSummarizer<S> {
    client: Client,
    backend: Option<String>,
    summarizer: S,
}

impl<S: Summarizer> DocumentSummarizer<S> {
    /// With a `backend` the document is posted as multipart; otherwise text is
    /// extracted locally and passed to `summarizer`
    pub fn new(backend: Option<String>, summarizer: S, timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            backend,
            summarizer,
        }
    }

    pub async fn summarize(&self, source: SummarizeSource) -> Result<String, SummaryError> {
        match &source {
            SummarizeSource::File(file) if file.is_empty() => {
                return Err(SummaryError::EmptyInput)
            }
            SummarizeSource::Url(url) if url.trim().is_empty() => {
                return Err(SummaryError::EmptyInput)
            }
            _ => {}
        }

        if let Some(backend) = self.backend.as_deref() {
            return self.summarize_remote(backend, source).await;
        }

        let text = match source {
            SummarizeSource::File(file) => file_text(&file)?,
            SummarizeSource::Url(url) => self.fetch_text(&url).await?,
        };

        tracing::info!("Document: summarizing {} chars locally extracted", text.len());
        self.summarizer.summarize(&text).await
    }

    async fn summarize_remote(
        &self,
        backend: &str,
        source: SummarizeSource,
    ) -> Result<String, SummaryError> {
        let form = match source {
            SummarizeSource::File(file) => {
                let part = multipart::Part::bytes(file.bytes)
                    .file_name(file.name)
                    .mime_str(&file.mime_type)
                    .map_err(ServiceError::from)?;
                multipart::Form::new().part("file", part)
            }
            SummarizeSource::Url(url) => multipart::Form::new().text("url", url),
        };

        let response = self
            .client
            .post(backend)
            .multipart(form)
            .send()
            .await
            .map_err(ServiceError::from)?;

        let body: SummaryResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(ServiceError::from)?;
        body.into_summary()
    }

    async fn fetch_text(&self, url: &str) -> Result<String, SummaryError> {
        tracing::info!("Document: fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ServiceError::from)?;
        let response = ensure_success(response).await?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);
        let body = response.text().await.map_err(ServiceError::from)?;

        let text = if is_html { strip_html(&body) } else { body };
        non_empty(text)
    }
}

fn file_text(file: &MediaFile) -> Result<String, SummaryError> {
    if file.kind() != Some(MediaKind::Text) {
        return Err(SummaryError::UnsupportedInput(file.mime_type.clone()));
    }

    let raw = String::from_utf8_lossy(&file.bytes).into_owned();
    let text = if file.mime_type.contains("html") {
        strip_html(&raw)
    } else {
        raw
    };
    non_empty(text)
}

fn non_empty(text: String) -> Result<String, SummaryError> {
    if text.trim().is_empty() {
        Err(SummaryError::EmptyInput)
    } else {
        Ok(text)
    }
}

/// Drop scripts, styles and tags, then collapse whitespace
pub fn strip_html(html: &str) -> String {
    static BLOCKS: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let blocks = BLOCKS.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
            .expect("valid block regex")
    });
    let tags = TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").expect("valid space regex"));

    let without_blocks = blocks.replace_all(html, " ");
    let without_tags = tags.replace_all(&without_blocks, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    space.replace_all(&decoded, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Summarizer for Recording {
        async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(format!("summary of {} chars", text.len()))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn strips_markup_and_scripts() {
        let html = "<html><head><style>p{}</style><script>var x = 1;</script></head>\
            <body><h1>Title</h1>\n<p>Fish &amp; chips</p></body></html>";
        assert_eq!(strip_html(html), "Title Fish & chips");
    }

    #[tokio::test]
    async fn text_file_goes_to_summarizer() {
        let doc = DocumentSummarizer::new(None, Recording::default(), 5);
        let file = MediaFile::new("notes.txt", "text/plain", b"Quarterly plan.".to_vec());

        let out = doc.summarize(SummarizeSource::File(file)).await.unwrap();
        assert_eq!(out, "summary of 15 chars");
        assert_eq!(
            doc.summarizer.seen.lock().unwrap().as_slice(),
            ["Quarterly plan.".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected() {
        let doc = DocumentSummarizer::new(None, Recording::default(), 5);

        assert_matches!(
            doc.summarize(SummarizeSource::Url("  ".to_string())).await,
            Err(SummaryError::EmptyInput)
        );
        assert_matches!(
            doc.summarize(SummarizeSource::File(MediaFile::new("a.txt", "text/plain", Vec::new())))
                .await,
            Err(SummaryError::EmptyInput)
        );
        assert!(doc.summarizer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn binary_files_cannot_be_summarized_locally() {
        let doc = DocumentSummarizer::new(None, Recording::default(), 5);
        let file = MediaFile::new("a.png", "image/png", vec![0x89, 0x50]);
        assert_matches!(
            doc.summarize(SummarizeSource::File(file)).await,
            Err(SummaryError::UnsupportedInput(mime)) if mime == "image/png"
        );
    }
}
