use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ceiling for audio submitted to the transcription provider (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Video host endpoints
    pub youtube: YoutubeConfig,

    /// Audio extraction provider settings
    pub extraction: ExtractionConfig,

    /// Speech-to-text provider settings
    pub transcription: TranscriptionConfig,

    /// Whole-pipeline limits
    pub pipeline: PipelineConfig,

    /// Per-user quota
    pub usage: UsageConfig,

    /// Language model used for framework extraction
    pub generation: GenerationConfig,

    /// Spreadsheet webhook logging
    pub sheets: SheetsConfig,

    /// HTTP server
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// Base URL of the host (watch pages, player API)
    pub base_url: String,

    /// oEmbed endpoint used for title/author lookups
    pub oembed_url: String,

    /// Thumbnail template, `{id}` is replaced with the video id
    pub thumbnail_template: String,

    /// Preferred caption language
    pub caption_language: String,
}

/// Which audio extraction strategy backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    DirectStream,
    ServerlessStream,
    PollingApi,
    TunnelApi,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::DirectStream => write!(f, "direct-stream"),
            StrategyKind::ServerlessStream => write!(f, "serverless-stream"),
            StrategyKind::PollingApi => write!(f, "polling-api"),
            StrategyKind::TunnelApi => write!(f, "tunnel-api"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Active strategy
    pub strategy: StrategyKind,

    /// Polling extraction API endpoint
    pub polling_api_url: String,

    /// Host header value expected by the polling API gateway
    pub polling_api_host: String,

    /// Polling API key (env: RAPIDAPI_KEY)
    pub polling_api_key: Option<String>,

    /// Delay between poll attempts in milliseconds
    pub poll_interval_ms: u64,

    /// Maximum number of status checks before giving up
    pub max_poll_attempts: u32,

    /// Tunnel extraction API endpoint
    pub tunnel_api_url: String,

    /// Tunnel API key (env: COBALT_API_KEY)
    pub tunnel_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Transcription API base URL
    pub api_url: String,

    /// Model name
    pub model: String,

    /// API key (env: OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// Upload ceiling in bytes
    pub max_upload_bytes: usize,

    /// Whole-request timeout for uploads; a 25 MiB file takes longer than ordinary calls
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Overall deadline for one transcript acquisition
    pub deadline_secs: u64,

    /// Timeout applied to each outbound HTTP request
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageBackend {
    Memory,
    Clerk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Free generations per user
    pub limit: u32,

    /// Where counters are kept
    pub backend: UsageBackend,

    /// Identity provider API base URL
    pub clerk_api_url: String,

    /// Identity provider secret (env: CLERK_SECRET_KEY)
    pub clerk_secret_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,

    /// API key (env: ANTHROPIC_API_KEY)
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Webhook receiving one JSON row per generation (env: GOOGLE_SHEETS_WEBHOOK_URL)
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube: YoutubeConfig::default(),
            extraction: ExtractionConfig::default(),
            transcription: TranscriptionConfig::default(),
            pipeline: PipelineConfig::default(),
            usage: UsageConfig::default(),
            generation: GenerationConfig::default(),
            sheets: SheetsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            oembed_url: "https://www.youtube.com/oembed".to_string(),
            thumbnail_template: "https://img.youtube.com/vi/{id}/maxresdefault.jpg".to_string(),
            caption_language: "en".to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::DirectStream,
            polling_api_url: "https://youtube-mp36.p.rapidapi.com/dl".to_string(),
            polling_api_host: "youtube-mp36.p.rapidapi.com".to_string(),
            polling_api_key: None,
            poll_interval_ms: 2000,
            max_poll_attempts: 30,
            tunnel_api_url: "https://api.cobalt.tools/".to_string(),
            tunnel_api_key: None,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            timeout_secs: 180,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 240,
            request_timeout_secs: 60,
        }
    }
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            limit: 3,
            backend: UsageBackend::Memory,
            clerk_api_url: "https://api.clerk.com/v1".to_string(),
            clerk_secret_key: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8000,
            api_key: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, writing defaults there if the file does not exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs_err::read_to_string(config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default location
    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // Current directory wins so a checkout can carry its own config
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("talk-to-landing").join("config.yaml"))
    }

    /// Fill secrets from the environment; set variables override the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.transcription.api_key = Some(key);
        }
        if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(key) = non_empty("CLERK_SECRET_KEY") {
            self.usage.clerk_secret_key = Some(key);
        }
        if let Some(key) = non_empty("RAPIDAPI_KEY") {
            self.extraction.polling_api_key = Some(key);
        }
        if let Some(key) = non_empty("COBALT_API_KEY") {
            self.extraction.tunnel_api_key = Some(key);
        }
        if let Some(url) = non_empty("GOOGLE_SHEETS_WEBHOOK_URL") {
            self.sheets.webhook_url = Some(url);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extraction.max_poll_attempts == 0 {
            anyhow::bail!("extraction.max_poll_attempts must be at least 1");
        }

        if self.usage.limit == 0 {
            anyhow::bail!("usage.limit must be at least 1");
        }

        if self.transcription.timeout_secs == 0 {
            anyhow::bail!("transcription.timeout_secs must be positive");
        }

        if self.pipeline.deadline_secs == 0 {
            anyhow::bail!("pipeline.deadline_secs must be positive");
        }

        if self.usage.backend == UsageBackend::Clerk && self.usage.clerk_secret_key.is_none() {
            anyhow::bail!("usage.backend is clerk but CLERK_SECRET_KEY is not set");
        }

        Ok(())
    }

    /// Whether the speech-to-text fallback can run
    pub fn transcription_configured(&self) -> bool {
        self.transcription.api_key.is_some()
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline.deadline_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.extraction.poll_interval_ms)
    }

    /// Shared HTTP client with the configured per-request timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.pipeline.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")
    }

    /// Client for transcription uploads, with its own longer timeout
    pub fn transcription_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.transcription_timeout())
            .build()
            .context("Failed to build transcription HTTP client")
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription.timeout_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Extraction Strategy: {}", self.extraction.strategy);
        println!("  Poll: {} x {}ms", self.extraction.max_poll_attempts, self.extraction.poll_interval_ms);
        println!("  Transcription Model: {} ({})", self.transcription.model, mask(&self.transcription.api_key));
        println!("  Upload Limit: {}", crate::utils::format_file_size(self.transcription.max_upload_bytes as u64));
        println!("  Pipeline Deadline: {}s", self.pipeline.deadline_secs);
        println!("  Usage: {} per user ({:?}, {})", self.usage.limit, self.usage.backend, mask(&self.usage.clerk_secret_key));
        println!("  Generation Model: {} ({})", self.generation.model, mask(&self.generation.api_key));
        println!("  Sheets Webhook: {}", if self.sheets.webhook_url.is_some() { "set" } else { "not set" });
        println!("  Server Bind: {}", self.server.bind);
    }
}

fn mask(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "key set",
        None => "no key",
    }
}
