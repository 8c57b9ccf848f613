// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod gate;
pub mod model;
pub mod retry;
pub mod runner;
pub mod telemetry;
pub mod text;
pub mod writer;

// ---- Re-exports for stable public API ----
pub use crate::config::RunConfig;
pub use crate::discover::{run_discovery, DiscoveryReport};
pub use crate::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, GatedFetcher};
pub use crate::gate::Gate;
pub use crate::runner::{run_extraction, ExtractionReport};
pub use crate::writer::{DedupWriter, RecordSink};
