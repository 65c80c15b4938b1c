//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline extracts and geocodes addresses. The CLI uses it to
//! drive a terminal progress bar; the HTTP server runs without one.
//!
//! # Example
//!
//! ```rust
//! use addrlens::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     resolved: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_address_resolved(&self, index: usize, total: usize) {
//!         let done = self.resolved.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("address {}/{} geocoded ({} so far)", index + 1, total, done);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { resolved: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as a request moves through its stages.
///
/// Implementations must be `Send + Sync`: address resolution runs
/// concurrently, so `on_address_*` may be called from several tasks at once.
/// All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called just before the image is sent to the vision model.
    fn on_extraction_start(&self) {}

    /// Called once the model's reply has been parsed.
    ///
    /// # Arguments
    /// * `count`: number of addresses the model returned
    fn on_extraction_complete(&self, count: usize) {
        let _ = count;
    }

    /// Called just before an address is sent to the geocoder.
    ///
    /// # Arguments
    /// * `index`: 0-indexed position in the extraction order
    /// * `total`: number of extracted addresses
    fn on_address_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when an address was geocoded.
    fn on_address_resolved(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when geocoding failed and a degraded record was substituted.
    ///
    /// # Arguments
    /// * `error`: human-readable cause
    fn on_address_degraded(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every address has been attempted.
    ///
    /// # Arguments
    /// * `total`: number of extracted addresses
    /// * `resolved`: addresses that geocoded without error
    fn on_pipeline_complete(&self, total: usize, resolved: usize) {
        let _ = (total, resolved);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        extracted: AtomicUsize,
        starts: AtomicUsize,
        resolved: AtomicUsize,
        degraded: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_extraction_complete(&self, count: usize) {
            self.extracted.store(count, Ordering::SeqCst);
        }

        fn on_address_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_address_resolved(&self, _index: usize, _total: usize) {
            self.resolved.fetch_add(1, Ordering::SeqCst);
        }

        fn on_address_degraded(&self, _index: usize, _total: usize, _error: &str) {
            self.degraded.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start();
        cb.on_extraction_complete(2);
        cb.on_address_start(0, 2);
        cb.on_address_resolved(0, 2);
        cb.on_address_degraded(1, 2, "no geocoding results found");
        cb.on_pipeline_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_extraction_complete(3);
        tracker.on_address_start(0, 3);
        tracker.on_address_resolved(0, 3);
        tracker.on_address_start(1, 3);
        tracker.on_address_resolved(1, 3);
        tracker.on_address_start(2, 3);
        tracker.on_address_degraded(2, 3, "timeout");

        assert_eq!(tracker.extracted.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.resolved.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.degraded.load(Ordering::SeqCst), 1);
    }
}
