//! Pipeline stages for image-to-geocoded-address extraction.
//!
//! Each submodule implements exactly one step, and the two network-bound
//! stages sit behind traits so the orchestrator never knows which vision
//! model or geocoder it is talking to.
//!
//! ## Data Flow
//!
//! ```text
//! image ──▶ encode ──▶ vision ──▶ geocode × N ──▶ records
//! (base64)  (strip)    (VLM)      (Census)        (ordered)
//! ```
//!
//! 1. [`encode`]: strip a `data:image/...` prefix and wrap the payload
//!    as `ImageData`
//! 2. [`vision`]: one VLM call; the reply must be a JSON array of strings
//! 3. [`geocode`]: one Census lookup per address, first candidate wins
//! 4. [`orchestrator`]: sequence the stages, degrade failed lookups, keep order

pub mod encode;
pub mod geocode;
pub mod orchestrator;
pub mod vision;
