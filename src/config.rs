use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "media-insight.json";
const API_KEY_XOR_KEY: &[u8] = b"media-insight-local-key-v1";

pub const CONFIG_PATH_ENV: &str = "MEDIA_INSIGHT_CONFIG";
pub const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.assemblyai.com/v2";
pub const DEFAULT_CAPTION_URL: &str =
    "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-large";
pub const DEFAULT_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CREDENTIALS_FILE: &str = "media-insight-users.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to save config: {0}")]
    Write(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transcription: TranscriptionConfig,
    pub caption: CaptionConfig,
    pub summary: SummaryConfig,
    pub poll: PollConfig,
    pub credentials_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub api_key_obfuscated: Option<String>,
    pub speaker_labels: bool,
    pub language_code: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRANSCRIPTION_URL.to_string(),
            api_key: None,
            api_key_obfuscated: None,
            speaker_labels: true,
            language_code: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub endpoint: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub api_key_obfuscated: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CAPTION_URL.to_string(),
            api_key: None,
            api_key_obfuscated: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Plain `{text} -> {summary}` endpoint, tried first when set
    pub endpoint: Option<String>,
    /// Multipart `file`/`url` endpoint used by document summaries
    pub document_endpoint: Option<String>,
    pub chat_url: String,
    pub chat_model: String,
    #[serde(skip)]
    pub chat_api_key: Option<String>,
    pub chat_api_key_obfuscated: Option<String>,
    /// Local fallback that needs no network
    pub extractive_fallback: bool,
    pub stopwords_path: Option<PathBuf>,
    pub max_sentences: usize,
    pub timeout_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            document_endpoint: None,
            chat_url: DEFAULT_CHAT_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chat_api_key: None,
            chat_api_key_obfuscated: None,
            extractive_fallback: true,
            stopwords_path: None,
            max_sentences: 3,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
    pub max_attempts: u32,
    /// Overall wall-clock budget for the poll loop; `None` disables it
    pub timeout_secs: Option<u64>,
    /// Polling fails on this many transient errors in a row (3 means the
    /// third consecutive error ends the loop)
    pub max_transient_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            backoff_multiplier: 1.5,
            max_interval_ms: 15_000,
            max_attempts: 200,
            timeout_secs: Some(1_800),
            max_transient_errors: 3,
        }
    }
}

/// Which stored key a caller wants to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeySlot {
    Transcription,
    Caption,
    Chat,
}

impl AppConfig {
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE))
    }

    /// Store a key obfuscated in the config file (empty clears it)
    pub fn set_api_key(&mut self, slot: ApiKeySlot, api_key: &str) {
        let trimmed = api_key.trim();
        let (plain, stored) = match slot {
            ApiKeySlot::Transcription => (
                &mut self.transcription.api_key,
                &mut self.transcription.api_key_obfuscated,
            ),
            ApiKeySlot::Caption => (&mut self.caption.api_key, &mut self.caption.api_key_obfuscated),
            ApiKeySlot::Chat => (
                &mut self.summary.chat_api_key,
                &mut self.summary.chat_api_key_obfuscated,
            ),
        };

        if trimmed.is_empty() {
            *plain = None;
            *stored = None;
        } else {
            *plain = Some(trimmed.to_string());
            *stored = Some(obfuscate_api_key(trimmed));
        }
    }

    /// One line per configured key, masked
    pub fn describe_keys(&self) -> Vec<(String, Option<String>)> {
        vec![
            (
                "transcription".to_string(),
                self.transcription.api_key.as_deref().map(mask_api_key),
            ),
            (
                "caption".to_string(),
                self.caption.api_key.as_deref().map(mask_api_key),
            ),
            (
                "chat".to_string(),
                self.summary.chat_api_key.as_deref().map(mask_api_key),
            ),
        ]
    }
}

/// Resolve the config file location: `MEDIA_INSIGHT_CONFIG` or the working directory
pub fn config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Load `.env`, the config file (if any) and environment overrides
pub fn load() -> Result<AppConfig, ConfigError> {
    let _ = dotenvy::dotenv();
    let mut config = load_from(&config_path())?;
    apply_env(&mut config);
    Ok(config)
}

/// Read a config file; a missing file yields defaults
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        let mut config = AppConfig::default();
        normalize_config(&mut config);
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: AppConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    normalize_config(&mut config);
    Ok(config)
}

pub fn save(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Write(format!("serialize: {}", e)))?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| ConfigError::Write(e.to_string()))?;
    }
    fs::write(path, json).map_err(|e| ConfigError::Write(e.to_string()))
}

/// Environment variables win over anything stored in the file
pub fn apply_env(config: &mut AppConfig) {
    if let Some(key) = env_value("ASSEMBLYAI_API_KEY") {
        config.transcription.api_key = Some(key);
    }
    if let Some(url) = env_value("ASSEMBLYAI_BASE_URL") {
        config.transcription.base_url = url;
    }
    if let Some(key) = env_value("HF_API_KEY") {
        config.caption.api_key = Some(key);
    }
    if let Some(url) = env_value("CAPTION_ENDPOINT") {
        config.caption.endpoint = url;
    }
    if let Some(url) = env_value("SUMMARY_ENDPOINT") {
        config.summary.endpoint = Some(url);
    }
    if let Some(url) = env_value("DOCUMENT_SUMMARY_ENDPOINT") {
        config.summary.document_endpoint = Some(url);
    }
    if let Some(key) = env_value("OPENAI_API_KEY") {
        config.summary.chat_api_key = Some(key);
    }
    if let Some(model) = env_value("SUMMARY_CHAT_MODEL") {
        config.summary.chat_model = model;
    }
    if let Some(attempts) = env_value("POLL_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
        config.poll.max_attempts = attempts;
    }
    if let Some(interval) = env_value("POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.poll.interval_ms = interval;
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_config(config: &mut AppConfig) {
    config.transcription.api_key = config
        .transcription
        .api_key_obfuscated
        .as_deref()
        .and_then(deobfuscate_api_key);
    config.caption.api_key = config
        .caption
        .api_key_obfuscated
        .as_deref()
        .and_then(deobfuscate_api_key);
    config.summary.chat_api_key = config
        .summary
        .chat_api_key_obfuscated
        .as_deref()
        .and_then(deobfuscate_api_key);

    config.summary.endpoint = normalize_url(config.summary.endpoint.take());
    config.summary.document_endpoint = normalize_url(config.summary.document_endpoint.take());
    config.transcription.language_code = config
        .transcription
        .language_code
        .take()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    if config.summary.max_sentences == 0 {
        config.summary.max_sentences = SummaryConfig::default().max_sentences;
    }
    if config.poll.max_attempts == 0 {
        config.poll.max_attempts = 1;
    }
    if !config.poll.backoff_multiplier.is_finite() || config.poll.backoff_multiplier < 1.0 {
        config.poll.backoff_multiplier = 1.0;
    }
}

fn normalize_url(url: Option<String>) -> Option<String> {
    url.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn obfuscate_api_key(api_key: &str) -> String {
    let mut bytes = api_key.as_bytes().to_vec();
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= API_KEY_XOR_KEY[idx % API_KEY_XOR_KEY.len()];
    }
    BASE64_STANDARD.encode(bytes)
}

fn deobfuscate_api_key(obfuscated: &str) -> Option<String> {
    let mut bytes = BASE64_STANDARD.decode(obfuscated).ok()?;
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= API_KEY_XOR_KEY[idx % API_KEY_XOR_KEY.len()];
    }
    String::from_utf8(bytes).ok()
}

pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= 10 {
        return "******".to_string();
    }

    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}********{}", prefix, suffix)
}
