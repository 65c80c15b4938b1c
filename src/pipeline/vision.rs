//! Extractor: turn one image into the address strings a vision model reads
//! off it.
//!
//! The request is a single user turn holding the instruction prompt and the
//! image. The reply must be a bare JSON array of strings; anything else is a
//! [`AddrLensError::MalformedResponse`]. There is no retry: a failed call
//! fails the request, because without an extraction there is nothing to
//! return.

use crate::config::PipelineConfig;
use crate::error::AddrLensError;
use crate::pipeline::encode;
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

/// Addresses read from one image, in the order the model listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub addresses: Vec<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Extraction {
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            ..Self::default()
        }
    }
}

/// The image → address-strings stage.
///
/// Injected into [`crate::pipeline::orchestrator::Orchestrator`] so tests and
/// alternative backends can replace the vision model.
#[async_trait]
pub trait AddressExtractor: Send + Sync {
    /// Extract addresses from a base64 image, optionally data-URL prefixed.
    async fn extract(&self, image: &str) -> Result<Extraction, AddrLensError>;
}

/// [`AddressExtractor`] backed by an edgequake-llm vision provider.
pub struct VisionExtractor {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    max_tokens: usize,
    temperature: f32,
    timeout_secs: u64,
}

impl std::fmt::Debug for VisionExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionExtractor")
            .field("provider", &"<dyn LLMProvider>")
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl VisionExtractor {
    /// Build an extractor, resolving the provider from `config`.
    ///
    /// # Errors
    /// [`AddrLensError::ProviderNotConfigured`] when no credential is
    /// available. This is the only place a missing key is detected, so a
    /// misconfigured server fails at startup rather than on its first request.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AddrLensError> {
        let provider = resolve_provider(config)?;
        Ok(Self::with_provider(provider, config))
    }

    /// Build an extractor around an already-constructed provider.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.vision_timeout_secs,
        }
    }
}

#[async_trait]
impl AddressExtractor for VisionExtractor {
    async fn extract(&self, image: &str) -> Result<Extraction, AddrLensError> {
        if encode::strip_data_url(image).is_empty() {
            return Err(AddrLensError::InvalidInput("Image is required".into()));
        }

        let start = Instant::now();
        let messages = build_messages(&self.prompt, encode::encode_image(image));
        let options = build_options(self.max_tokens, self.temperature);

        let response = timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| AddrLensError::VisionTimeout {
            secs: self.timeout_secs,
        })?
        .map_err(|e| AddrLensError::VisionApiError {
            message: format!("{e}"),
        })?;

        debug!(
            "Extraction: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let addresses = parse_addresses(&response.content)?;
        info!("Vision model returned {} addresses", addresses.len());

        Ok(Extraction {
            addresses,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Parse the model's reply as a JSON array of strings.
///
/// The array is returned verbatim: no trimming, deduplication or filtering.
pub fn parse_addresses(content: &str) -> Result<Vec<String>, AddrLensError> {
    if content.trim().is_empty() {
        return Err(AddrLensError::EmptyResponse);
    }
    serde_json::from_str::<Vec<String>>(content).map_err(|e| AddrLensError::MalformedResponse {
        detail: e.to_string(),
    })
}

/// One user turn: the instruction text followed by the image.
fn build_messages(prompt: &str, image: ImageData) -> Vec<ChatMessage> {
    vec![ChatMessage::user_with_images(prompt, vec![image])]
}

fn build_options(max_tokens: usize, temperature: f32) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AddrLensError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AddrLensError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. a pre-built provider in `config.provider`;
/// 2. `config.provider_name` with `config.model`; OpenAI additionally
///    requires `OPENAI_API_KEY`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. `ProviderFactory::from_env` auto-detection.
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, AddrLensError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        if name.eq_ignore_ascii_case("openai") && env_non_empty("OPENAI_API_KEY").is_none() {
            return Err(AddrLensError::ProviderNotConfigured {
                provider: name.clone(),
                hint: "OPENAI_API_KEY not set".to_string(),
            });
        }
        return create_vision_provider(name, &config.model);
    }

    if let (Some(prov), Some(model)) = (
        env_non_empty("EDGEQUAKE_LLM_PROVIDER"),
        env_non_empty("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    if env_non_empty("OPENAI_API_KEY").is_some() {
        return create_vision_provider("openai", &config.model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AddrLensError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    // from_env falls back to a canned mock when it finds no credential.
    if llm_provider.name() == MOCK_PROVIDER {
        return Err(AddrLensError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: "No vision credential found in environment. Set OPENAI_API_KEY, \
                   ANTHROPIC_API_KEY, GEMINI_API_KEY or pass --provider."
                .to_string(),
        });
    }

    Ok(llm_provider)
}

/// Name edgequake-llm reports for its auto-detection fallback.
const MOCK_PROVIDER: &str = "mock";
