//! Resolver: standardize one free-text address and attach coordinates via
//! the US Census onelineaddress geocoder.
//!
//! The whole address goes out as a single `address` query parameter; no local
//! street/city/state decomposition is attempted. When the geocoder returns
//! several candidates the first one wins, with no scoring of its own.

use crate::config::PipelineConfig;
use crate::error::{AddrLensError, GeocodeError};
use crate::output::{AddressRecord, GeocodeMatch};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Path of the one-line address lookup under the geocoder base URL.
const ONELINE_PATH: &str = "/geocoder/locations/onelineaddress";

/// The address-string → geocoded-record stage.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve one address. Any error is recoverable: callers substitute
    /// [`AddressRecord::degraded`].
    async fn resolve(&self, address: &str) -> Result<AddressRecord, GeocodeError>;
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CensusResponse {
    #[serde(default)]
    result: Option<CensusResult>,
}

#[derive(Debug, Deserialize)]
struct CensusResult {
    #[serde(rename = "addressMatches", default)]
    address_matches: Vec<CensusMatch>,
}

#[derive(Debug, Deserialize)]
struct CensusMatch {
    #[serde(rename = "matchedAddress")]
    matched_address: String,
    coordinates: CensusCoordinates,
}

/// `x` is longitude, `y` is latitude.
#[derive(Debug, Deserialize)]
struct CensusCoordinates {
    x: f64,
    y: f64,
}

/// Decode a geocoder reply and pick its first candidate.
pub fn first_match(body: &[u8]) -> Result<GeocodeMatch, GeocodeError> {
    let parsed: CensusResponse =
        serde_json::from_slice(body).map_err(|e| GeocodeError::Malformed {
            detail: e.to_string(),
        })?;

    parsed
        .result
        .and_then(|r| r.address_matches.into_iter().next())
        .map(|m| GeocodeMatch {
            standardized_address: m.matched_address,
            longitude: m.coordinates.x,
            latitude: m.coordinates.y,
        })
        .ok_or(GeocodeError::NoMatch)
}

// ── Census client ────────────────────────────────────────────────────────

/// [`AddressResolver`] backed by the Census geocoding API.
#[derive(Debug, Clone)]
pub struct CensusGeocoder {
    client: reqwest::Client,
    endpoint: String,
    benchmark: String,
    timeout_secs: u64,
}

impl CensusGeocoder {
    /// Build a geocoder from the pipeline configuration.
    ///
    /// The per-call timeout is enforced by the HTTP client, so a hung
    /// connection is abandoned after `geocode_timeout_secs`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AddrLensError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.geocode_timeout_secs))
            .build()
            .map_err(|e| AddrLensError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.geocoder_url.trim_end_matches('/'),
                ONELINE_PATH
            ),
            benchmark: config.benchmark.clone(),
            timeout_secs: config.geocode_timeout_secs,
        })
    }

    /// Full lookup URL without the query string.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_transport(&self, e: reqwest::Error) -> GeocodeError {
        if e.is_timeout() {
            GeocodeError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            GeocodeError::Transport {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl AddressResolver for CensusGeocoder {
    async fn resolve(&self, address: &str) -> Result<AddressRecord, GeocodeError> {
        let start = Instant::now();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("address", address),
                ("benchmark", self.benchmark.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.map_transport(e))?;
        let m = first_match(&body)?;

        debug!(
            "Geocoded '{}' → '{}' ({}, {}) in {:?}",
            address,
            m.standardized_address,
            m.latitude,
            m.longitude,
            start.elapsed()
        );

        Ok(AddressRecord::from_match(address, m))
    }
}

/// Resolve `address`, substituting a degraded record on failure.
///
/// Returns the geocoding error alongside so callers can report it.
pub async fn resolve_or_degrade(
    resolver: &dyn AddressResolver,
    address: &str,
) -> (AddressRecord, Option<GeocodeError>) {
    match resolver.resolve(address).await {
        Ok(record) => (record, None),
        Err(e) => {
            warn!("Failed to geocode address '{}': {}", address, e);
            (AddressRecord::degraded(address), Some(e))
        }
    }
}

/// Single-address lookup: needs only a resolver, never a vision provider.
///
/// # Errors
/// [`AddrLensError::InvalidInput`] for an empty address. Geocoding failures
/// yield a degraded record.
pub async fn geocode_address(
    resolver: &dyn AddressResolver,
    address: &str,
) -> Result<AddressRecord, AddrLensError> {
    if address.is_empty() {
        return Err(AddrLensError::InvalidInput("Address is required".into()));
    }
    Ok(resolve_or_degrade(resolver, address).await.0)
}
