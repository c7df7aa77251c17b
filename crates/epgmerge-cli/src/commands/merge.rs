//! The merge command: run the full pipeline and print the run summary.

use anyhow::Context;
use epgmerge_core::{Config, MergePipeline, SourceOutcome};
use std::path::{Path, PathBuf};

/// Loads configuration, applies flag overrides, and runs the pipeline.
///
/// Per-source failures are reported in the summary, not here; an `Err`
/// from this function means the run itself failed (bad configuration or a
/// fatal output write) and the process should exit non-zero.
pub async fn execute(
    config_path: &Path,
    trim: bool,
    no_gzip: bool,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = Config::load(config_path).with_context(|| {
        format!(
            "failed to load configuration from {}",
            config_path.display()
        )
    })?;

    if trim {
        config.merge.trim = true;
    }
    if no_gzip {
        config.output.gzip = false;
    }
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }

    if config.sources.is_empty() {
        anyhow::bail!("no sources configured in {}", config_path.display());
    }

    let pipeline = MergePipeline::new(config)?;
    let summary = pipeline.run().await?;

    for outcome in &summary.outcomes {
        match outcome {
            SourceOutcome::Ingested { source, stats } => {
                println!(
                    "  {source}: {} new channels, {} duplicates, {} programmes",
                    stats.new_channels, stats.duplicate_channels, stats.programmes
                );
            },
            SourceOutcome::Skipped { source, reason } => {
                println!("  {source}: skipped ({reason})");
            },
        }
    }

    println!(
        "Wrote {} channels and {} programmes to {} ({} of {} sources skipped)",
        summary.channels,
        summary.programmes,
        summary.output_path.display(),
        summary.skipped(),
        summary.outcomes.len()
    );

    Ok(())
}
