//! # addrlens
//!
//! Read delivery addresses off a photo with a Vision Language Model, then
//! standardize and geocode each one with the US Census geocoder.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (base64)
//!  │
//!  ├─ 1. Encode   strip data-URL prefix, wrap for the vision API
//!  ├─ 2. Extract  one VLM call → JSON array of address strings
//!  ├─ 3. Resolve  concurrent Census lookups, first match wins
//!  └─ 4. Output   records in extraction order; failed lookups degrade
//!                 to zero coordinates instead of disappearing
//! ```
//!
//! A failed extraction fails the request. A failed lookup never does.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use addrlens::{Orchestrator, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::default();
//!     let pipeline = Orchestrator::from_config(&config)?;
//!
//!     let image = addrlens::pipeline::encode::encode_bytes(&std::fs::read("label.jpg")?);
//!     let output = pipeline.run(&image).await?;
//!     for record in &output.addresses {
//!         println!("{} → ({}, {})", record.standardized, record.latitude, record.longitude);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `addrlens` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, ServerConfig};
pub use error::{AddrLensError, GeocodeError};
pub use output::{
    AddressRecord, ExtractionRequest, GeocodeMatch, GeocodeRequest, PipelineOutput, PipelineStats,
    ResponseEnvelope,
};
pub use pipeline::geocode::{geocode_address, AddressResolver, CensusGeocoder};
pub use pipeline::orchestrator::Orchestrator;
pub use pipeline::vision::{AddressExtractor, Extraction, VisionExtractor};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use server::{build_router, serve, AppState};
