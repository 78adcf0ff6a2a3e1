// src/summary/extractive.rs
// Local frequency-based summarizer, no network

use super::{SummaryError, Summarizer};
use crate::model::ModelSlot;
use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

const BUILTIN_STOPWORDS: &str = "a an and are as at be been but by for from had has have he her \
    his i if in into is it its me my no not of on or our she so that the their them then there \
    these they this to too was we were what when which who will with you your um uh like just \
    yeah okay ok";

/// Words ignored when scoring sentences
#[derive(Debug)]
pub struct StopwordModel {
    words: HashSet<String>,
}

impl StopwordModel {
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_STOPWORDS)
    }

    /// Whitespace or newline separated word list; `#` starts a comment line
    pub fn parse(raw: &str) -> Self {
        let words = raw
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .flat_map(|line| line.split_whitespace())
            .map(|w| w.to_lowercase())
            .collect();
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn shared_slot() -> Arc<ModelSlot<StopwordModel>> {
    static SLOT: OnceLock<Arc<ModelSlot<StopwordModel>>> = OnceLock::new();
    SLOT.get_or_init(|| Arc::new(ModelSlot::new())).clone()
}

fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?\n]+[.!?]*").expect("valid sentence regex"))
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}']+").expect("valid word regex"))
}

pub struct ExtractiveSummarizer {
    slot: Arc<ModelSlot<StopwordModel>>,
    stopwords_path: Option<PathBuf>,
    max_sentences: usize,
}

impl ExtractiveSummarizer {
    /// Uses the process-wide stopword model; the first successful load wins
    pub fn new(stopwords_path: Option<PathBuf>, max_sentences: usize) -> Self {
        Self::with_slot(shared_slot(), stopwords_path, max_sentences)
    }

    pub fn with_slot(
        slot: Arc<ModelSlot<StopwordModel>>,
        stopwords_path: Option<PathBuf>,
        max_sentences: usize,
    ) -> Self {
        Self {
            slot,
            stopwords_path,
            max_sentences: max_sentences.max(1),
        }
    }

    async fn model(&self) -> Result<Arc<StopwordModel>, SummaryError> {
        let path = self.stopwords_path.clone();
        let model = self
            .slot
            .get_or_load(|| async move {
                match path {
                    Some(path) => {
                        tracing::info!("Loading stopwords from {}", path.display());
                        let raw = tokio::fs::read_to_string(&path)
                            .await
                            .map_err(|e| format!("{}: {}", path.display(), e))?;
                        Ok(StopwordModel::parse(&raw))
                    }
                    None => Ok(StopwordModel::builtin()),
                }
            })
            .await?;
        Ok(model)
    }

    /// Pick the highest-scoring sentences, kept in their original order
    pub fn extract(text: &str, stopwords: &StopwordModel, max_sentences: usize) -> String {
        let sentences: Vec<&str> = sentence_regex()
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect();

        if sentences.len() <= max_sentences {
            return sentences.join(" ");
        }

        let mut frequencies: HashMap<String, usize> = HashMap::new();
        for sentence in &sentences {
            for word in word_regex().find_iter(sentence) {
                let word = word.as_str().to_lowercase();
                if !stopwords.contains(&word) {
                    *frequencies.entry(word).or_insert(0) += 1;
                }
            }
        }

        let mut scored: Vec<(usize, f32)> = sentences
            .iter()
            .enumerate()
            .map(|(idx, sentence)| {
                let words: Vec<String> = word_regex()
                    .find_iter(sentence)
                    .map(|w| w.as_str().to_lowercase())
                    .collect();
                let total: usize = words
                    .iter()
                    .filter_map(|w| frequencies.get(w))
                    .sum();
                let score = if words.is_empty() {
                    0.0
                } else {
                    total as f32 / words.len() as f32
                };
                (idx, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut picked: Vec<usize> = scored
            .into_iter()
            .take(max_sentences)
            .map(|(idx, _)| idx)
            .collect();
        picked.sort_unstable();

        picked
            .into_iter()
            .map(|idx| sentences[idx])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        let stopwords = self.model().await?;
        let summary = Self::extract(text, &stopwords, self.max_sentences);
        if summary.is_empty() {
            return Err(SummaryError::EmptyInput);
        }
        Ok(summary)
    }

    fn name(&self) -> &str {
        "extractive"
    }
}
