//! Configuration types for the extraction pipeline and the HTTP server.
//!
//! Every pipeline knob lives in [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. The struct is cheap to clone and shared
//! read-only across requests, so two concurrent requests can never observe
//! different settings.

use crate::error::AddrLensError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default base URL of the US Census geocoder.
pub const DEFAULT_GEOCODER_URL: &str = "https://geocoding.geo.census.gov";

/// Default Census benchmark (the public, current address range dataset).
pub const DEFAULT_BENCHMARK: &str = "Public_AR_Current";

/// Configuration for the extract → geocode pipeline.
///
/// # Example
/// ```rust
/// use addrlens::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4o-mini")
///     .resolve_concurrency(8)
///     .geocode_timeout_secs(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.resolve_concurrency, 8);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Vision model identifier. Default: `gpt-4o`.
    pub model: String,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, OpenAI is used when `OPENAI_API_KEY` is
    /// set, otherwise the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Custom extraction instruction. If None, uses the built-in prompt.
    pub prompt: Option<String>,

    /// Maximum tokens the model may generate. Default: 1000.
    ///
    /// A photographed manifest rarely lists more than a few dozen addresses;
    /// 1000 tokens covers that with room to spare.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Timeout for the vision call in seconds. Default: 60.
    pub vision_timeout_secs: u64,

    /// Base URL of the Census geocoder. Default: the public endpoint.
    pub geocoder_url: String,

    /// Census benchmark dataset. Default: `Public_AR_Current`.
    pub benchmark: String,

    /// Timeout for each geocoding call in seconds. Default: 10.
    pub geocode_timeout_secs: u64,

    /// Number of concurrent geocoding calls per request. Default: 4.
    ///
    /// The Census geocoder is a shared public service; a small bound keeps a
    /// busy manifest from hammering it while still overlapping round trips.
    pub resolve_concurrency: usize,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            prompt: None,
            max_tokens: 1000,
            temperature: 0.0,
            vision_timeout_secs: 60,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            benchmark: DEFAULT_BENCHMARK.to_string(),
            geocode_timeout_secs: 10,
            resolve_concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("custom_prompt", &self.prompt.is_some())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("vision_timeout_secs", &self.vision_timeout_secs)
            .field("geocoder_url", &self.geocoder_url)
            .field("benchmark", &self.benchmark)
            .field("geocode_timeout_secs", &self.geocode_timeout_secs)
            .field("resolve_concurrency", &self.resolve_concurrency)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn vision_timeout_secs(mut self, secs: u64) -> Self {
        self.config.vision_timeout_secs = secs;
        self
    }

    pub fn geocoder_url(mut self, url: impl Into<String>) -> Self {
        self.config.geocoder_url = url.into();
        self
    }

    pub fn benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.config.benchmark = benchmark.into();
        self
    }

    pub fn geocode_timeout_secs(mut self, secs: u64) -> Self {
        self.config.geocode_timeout_secs = secs;
        self
    }

    pub fn resolve_concurrency(mut self, n: usize) -> Self {
        self.config.resolve_concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, AddrLensError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(AddrLensError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(AddrLensError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.vision_timeout_secs == 0 || c.geocode_timeout_secs == 0 {
            return Err(AddrLensError::InvalidConfig("Timeouts must be ≥ 1s".into()));
        }
        if !(c.geocoder_url.starts_with("http://") || c.geocoder_url.starts_with("https://")) {
            return Err(AddrLensError::InvalidConfig(format!(
                "Geocoder URL must be http(s), got '{}'",
                c.geocoder_url
            )));
        }
        if c.benchmark.trim().is_empty() {
            return Err(AddrLensError::InvalidConfig("Benchmark must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Listener and CORS settings for the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin (development posture).
    pub cors_origins: Vec<String>,
    /// Largest accepted request body. Default: 20 MiB.
    ///
    /// Phone photos base64-encode to several megabytes, well past axum's
    /// 2 MB default.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse a comma-separated origin list, dropping blanks. `*` alone means
    /// "any origin" and yields an empty list.
    pub fn parse_origins(raw: &str) -> Vec<String> {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.iter().any(|o| o == "*") {
            Vec::new()
        } else {
            origins
        }
    }
}
