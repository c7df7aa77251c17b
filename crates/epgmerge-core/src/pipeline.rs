//! The merge pipeline: resolve each source, ingest, assemble, normalize,
//! write.
//!
//! Sources are resolved and ingested one at a time in configured order, so
//! the source list doubles as a priority ranking. A failed source is
//! skipped with a warning and the run continues; only config and output
//! failures are fatal. Normalization only begins once every source is
//! merged, because orphan pruning and dedup depend on the global state.

use crate::cache::{CacheStore, read_source_file};
use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::merge::{IngestStats, MergeState};
use crate::normalize::{self, NormalizeReport};
use crate::types::Document;
use crate::{Result, parser, writer};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// What happened to one configured source during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The source resolved and its records were merged.
    Ingested {
        /// Source address as configured.
        source: String,
        /// Ingest counters for this source.
        stats: IngestStats,
    },
    /// The source failed to resolve and contributed nothing.
    Skipped {
        /// Source address as configured.
        source: String,
        /// Failure description, including the error category.
        reason: String,
    },
}

/// Summary of a completed run: the primary diagnostic surface.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Per-source outcomes, in configured order.
    pub outcomes: Vec<SourceOutcome>,
    /// Repair counts from the normalization pipeline.
    pub report: NormalizeReport,
    /// Channels in the written guide.
    pub channels: usize,
    /// Programmes in the written guide.
    pub programmes: usize,
    /// Where the guide was written.
    pub output_path: PathBuf,
}

impl RunSummary {
    /// Number of sources that contributed nothing.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Skipped { .. }))
            .count()
    }
}

/// The merge pipeline. Owns the fetcher, the cache store, and (for the
/// duration of [`run`](Self::run)) the merge state and document.
pub struct MergePipeline {
    config: Config,
    fetcher: Fetcher,
    cache: CacheStore,
}

impl MergePipeline {
    /// Builds a pipeline from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Fetcher::with_timeout(Duration::from_secs(config.fetch.timeout_secs))?;
        let cache = CacheStore::new(config.paths.cache_dir(), config.fetch.refresh_hours);
        Ok(Self {
            config,
            fetcher,
            cache,
        })
    }

    /// The cache store backing this pipeline.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Runs the full merge: resolve and ingest every configured source,
    /// assemble, normalize, write.
    ///
    /// Always attempts to produce output from whatever sources succeeded;
    /// an `Err` here means the run itself failed (normalization round trip
    /// or output write), not that a source did.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut state = MergeState::new();
        let mut outcomes = Vec::new();

        for source in &self.config.sources {
            match self.resolve(source).await {
                Ok(doc) => {
                    let stats = state.ingest(doc, Utc::now(), self.config.merge.trim);
                    outcomes.push(SourceOutcome::Ingested {
                        source: source.clone(),
                        stats,
                    });
                },
                Err(err) => {
                    warn!("Skipping source {source}: {err}");
                    outcomes.push(SourceOutcome::Skipped {
                        source: source.clone(),
                        reason: format!("{} error: {err}", err.category()),
                    });
                },
            }
        }

        let mut doc = writer::build_document(state, &self.config.generator, Utc::now());
        let report = normalize::run(&mut doc)?;

        let xml = writer::to_xml(&doc)?;
        let output_path = self.config.output.target_path();
        writer::write_output(&output_path, &xml, self.config.output.gzip)?;

        Ok(RunSummary {
            outcomes,
            report,
            channels: doc.channels.len(),
            programmes: doc.programmes.len(),
            output_path,
        })
    }

    /// Resolves one source to a parsed document.
    ///
    /// Remote sources are served from the cache when fresh, fetched and
    /// cached otherwise. Local paths are read directly, `.gz` or plain,
    /// and never cached.
    pub async fn resolve(&self, source: &str) -> Result<Document> {
        if is_remote(source) {
            let key = CacheStore::cache_key(source);
            if self.cache.fresh(&key) {
                info!("Using cached copy of {source}");
            } else {
                let bytes = self.fetcher.fetch(source).await?;
                let gzipped = source.to_ascii_lowercase().ends_with(".gz");
                self.cache.store(&key, &bytes, gzipped)?;
            }
            let text = self.cache.load(&key)?;
            parser::parse_document(&text)
        } else {
            info!("Reading local source {source}");
            let text = read_source_file(Path::new(source))?;
            parser::parse_document(&text)
        }
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
