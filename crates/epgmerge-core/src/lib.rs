//! # epgmerge-core
//!
//! Core functionality for epgmerge - a batch merger for XMLTV electronic
//! program guides.
//!
//! This crate ingests multiple XMLTV feeds, reconciles overlapping channel
//! and programme data from independent sources, repairs malformed fields,
//! and emits one normalized, schema-valid guide file.
//!
//! ## Architecture
//!
//! The crate is organized around the merge pipeline's stages:
//!
//! - **Cache & Fetching**: file-backed cache of fetched sources with a TTL
//!   freshness policy; remote sources are fetched with a bounded timeout
//! - **Parsing**: lenient XMLTV reader that recovers structure from
//!   damaged documents instead of failing closed
//! - **Merging**: channel deduplication and programme collision resolution
//!   across sources, first-seen wins
//! - **Normalization**: a fixed sequence of independent, idempotent repair
//!   passes (timezone offsets, exponent timestamps, escaping, chronology,
//!   orphan references)
//! - **Writing**: document assembly with provenance metadata and atomic,
//!   optionally gzipped output
//!
//! ## Quick Start
//!
//! ```no_run
//! use epgmerge_core::{Config, MergePipeline, Result};
//!
//! # async fn example() -> Result<()> {
//! let config = Config::load(std::path::Path::new("epgmerge.toml"))?;
//! let pipeline = MergePipeline::new(config)?;
//! let summary = pipeline.run().await?;
//! println!(
//!     "{} channels, {} programmes, {} sources skipped",
//!     summary.channels,
//!     summary.programmes,
//!     summary.skipped()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! A failed source contributes nothing and the run continues; individual
//! damaged records are skipped; integrity violations are resolved by the
//! normalization pipeline's drop/rewrite policy. Only configuration and
//! output-write failures abort a run.

/// File-backed cache for fetched source content
pub mod cache;
/// Run configuration loaded from TOML
pub mod config;
/// Error types and result aliases
pub mod error;
/// HTTP fetching of remote sources
pub mod fetcher;
/// Merge state and the per-source ingest collector
pub mod merge;
/// Normalization passes over the assembled document
pub mod normalize;
/// Lenient XMLTV document parser
pub mod parser;
/// Pipeline orchestration and run summaries
pub mod pipeline;
/// Core data types for the merged guide
pub mod types;
/// Document assembly and serialization
pub mod writer;

// Re-export commonly used types
pub use cache::CacheStore;
pub use config::{Config, FetchConfig, GeneratorConfig, MergeConfig, OutputConfig, PathsConfig};
pub use error::{Error, Result};
pub use fetcher::Fetcher;
pub use merge::{IngestStats, MergeState};
pub use normalize::NormalizeReport;
pub use pipeline::{MergePipeline, RunSummary, SourceOutcome};
pub use types::{Channel, DisplayName, Document, Programme, normalize_id, parse_timestamp};
