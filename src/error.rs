//! Error types for the addrlens library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AddrLensError`] is **fatal**: the request cannot produce any addresses
//!   (no image supplied, vision provider not configured, the model replied
//!   with something that is not a JSON array). Returned as
//!   `Err(AddrLensError)` from [`crate::pipeline::orchestrator::Orchestrator::run`]
//!   and surfaced to HTTP callers as a 4xx/5xx.
//!
//! * [`GeocodeError`] is **non-fatal**: a single address could not be
//!   geocoded, but the extracted text is still useful. The orchestrator logs
//!   it and substitutes a degraded [`crate::output::AddressRecord`] instead
//!   of failing the whole request.

use thiserror::Error;

/// All fatal errors returned by the addrlens library.
///
/// Per-address geocoding failures use [`GeocodeError`] and never reach here.
#[derive(Debug, Error)]
pub enum AddrLensError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The caller supplied an unusable request (empty image, empty address).
    #[error("{0}")]
    InvalidInput(String),

    // ── Vision errors ─────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision API call failed at the transport or API level.
    #[error("LLM API error: {message}")]
    VisionApiError { message: String },

    /// The vision API call did not complete within the configured timeout.
    #[error("LLM API call timed out after {secs}s")]
    VisionTimeout { secs: u64 },

    /// The model answered with no content at all.
    #[error("No response from the vision model")]
    EmptyResponse,

    /// The model answered, but not with a JSON array of strings.
    #[error("Failed to parse model response as a JSON array of strings: {detail}")]
    MalformedResponse { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AddrLensError {
    /// `true` when the failure was caused by the caller's input rather than
    /// by this service or one of its upstreams.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AddrLensError::InvalidInput(_))
    }
}

/// A non-fatal error for a single address.
///
/// Absorbed into a degraded record by the orchestrator and by the
/// single-address endpoint; only ever logged.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum GeocodeError {
    /// The geocoder could not be reached or the connection broke.
    #[error("geocoding request failed: {detail}")]
    Transport { detail: String },

    /// The geocoder did not answer within the configured timeout.
    #[error("geocoding request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The geocoder answered with a non-success HTTP status.
    #[error("geocoding API error: HTTP {status}")]
    HttpStatus { status: u16 },

    /// The reply body could not be decoded into the expected shape.
    #[error("failed to decode geocoding response: {detail}")]
    Malformed { detail: String },

    /// The geocoder returned zero candidates for the address.
    #[error("no geocoding results found")]
    NoMatch,
}
