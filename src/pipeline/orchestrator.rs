//! Orchestrator: one extraction, then one geocoding call per address.
//!
//! ## Failure policy
//!
//! Extraction failures abort the request: without addresses there is nothing
//! to return. Geocoding failures never abort it: the address text the model
//! read is still useful, so a degraded record (`standardized == original`,
//! zero coordinates) takes its place and the cause is only logged.
//!
//! ## Concurrency
//!
//! Geocoding calls are independent, so up to `resolve_concurrency` of them
//! run at once through an ordered buffered stream. `buffered` (not
//! `buffer_unordered`) yields results in input order, which is the order the
//! model listed the addresses. The calls are polled inside the caller's
//! future rather than spawned, so dropping that future (for example when an
//! HTTP client disconnects) cancels every in-flight lookup.

use crate::config::PipelineConfig;
use crate::error::{AddrLensError, GeocodeError};
use crate::output::{AddressRecord, PipelineOutput, PipelineStats};
use crate::pipeline::geocode::{
    geocode_address, resolve_or_degrade, AddressResolver, CensusGeocoder,
};
use crate::pipeline::vision::{AddressExtractor, VisionExtractor};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Sequences the extractor and resolver for one inbound image.
///
/// Holds no per-request state; share it behind an `Arc`.
#[derive(Clone)]
pub struct Orchestrator {
    extractor: Arc<dyn AddressExtractor>,
    resolver: Arc<dyn AddressResolver>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("concurrency", &self.concurrency)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Orchestrator {
    /// Assemble an orchestrator from explicitly constructed stages.
    pub fn new(
        extractor: Arc<dyn AddressExtractor>,
        resolver: Arc<dyn AddressResolver>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            resolver,
            concurrency: config.resolve_concurrency.max(1),
            progress: config.progress_callback.clone(),
        }
    }

    /// Build the production stages (vision provider + Census geocoder).
    ///
    /// # Errors
    /// Fails when the vision provider has no credential or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AddrLensError> {
        let extractor = VisionExtractor::from_config(config)?;
        let resolver = CensusGeocoder::from_config(config)?;
        Ok(Self::new(Arc::new(extractor), Arc::new(resolver), config))
    }

    /// Extract every address in `image` and geocode each one.
    ///
    /// # Returns
    /// `Ok(PipelineOutput)` whenever extraction succeeded, including when the
    /// model found no addresses or some addresses failed to geocode.
    ///
    /// # Errors
    /// - [`AddrLensError::InvalidInput`] for an empty image; no external
    ///   call is made.
    /// - Any extraction failure, unchanged.
    pub async fn run(&self, image: &str) -> Result<PipelineOutput, AddrLensError> {
        let total_start = Instant::now();

        if image.is_empty() {
            return Err(AddrLensError::InvalidInput("Image is required".into()));
        }

        // ── Stage 1: extract ─────────────────────────────────────────────
        if let Some(ref cb) = self.progress {
            cb.on_extraction_start();
        }
        let extraction_start = Instant::now();
        let extraction = self.extractor.extract(image).await?;
        let extraction_ms = extraction_start.elapsed().as_millis() as u64;

        let total = extraction.addresses.len();
        if let Some(ref cb) = self.progress {
            cb.on_extraction_complete(total);
        }

        // ── Stage 2: resolve ─────────────────────────────────────────────
        let resolution_start = Instant::now();
        let outcomes: Vec<(AddressRecord, Option<GeocodeError>)> =
            stream::iter(extraction.addresses.into_iter().enumerate().map(
                |(index, address)| async move {
                    if let Some(ref cb) = self.progress {
                        cb.on_address_start(index, total);
                    }
                    let outcome = resolve_or_degrade(self.resolver.as_ref(), &address).await;
                    if let Some(ref cb) = self.progress {
                        match &outcome.1 {
                            None => cb.on_address_resolved(index, total),
                            Some(e) => cb.on_address_degraded(index, total, &e.to_string()),
                        }
                    }
                    outcome
                },
            ))
            .buffered(self.concurrency)
            .collect()
            .await;
        let resolution_ms = resolution_start.elapsed().as_millis() as u64;

        let resolved = outcomes.iter().filter(|(_, err)| err.is_none()).count();
        let addresses: Vec<AddressRecord> = outcomes.into_iter().map(|(r, _)| r).collect();

        let stats = PipelineStats {
            extracted: total,
            resolved,
            degraded: total - resolved,
            input_tokens: extraction.input_tokens,
            output_tokens: extraction.output_tokens,
            extraction_ms,
            resolution_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Pipeline complete: {}/{} addresses geocoded, {}ms total",
            resolved, total, stats.total_ms
        );
        if let Some(ref cb) = self.progress {
            cb.on_pipeline_complete(total, resolved);
        }

        Ok(PipelineOutput { addresses, stats })
    }

    /// Geocode a single address, degrading on failure.
    ///
    /// # Errors
    /// Only [`AddrLensError::InvalidInput`] for an empty address; geocoding
    /// failures yield a degraded record, matching the batch policy.
    pub async fn geocode(&self, address: &str) -> Result<AddressRecord, AddrLensError> {
        geocode_address(self.resolver.as_ref(), address).await
    }
}
