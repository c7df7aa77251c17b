//! The clear command: remove cached source artifacts.

use anyhow::Context;
use epgmerge_core::{CacheStore, Config};
use std::path::Path;

/// Clears the cache directory configured for this deployment.
///
/// Refuses to act without `--force`; the next merge after a clear
/// re-fetches every remote source.
pub fn execute(config_path: &Path, force: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path).with_context(|| {
        format!(
            "failed to load configuration from {}",
            config_path.display()
        )
    })?;

    let cache_dir = config.paths.cache_dir();
    if !force {
        anyhow::bail!(
            "this removes all cached artifacts under {}; pass --force to proceed",
            cache_dir.display()
        );
    }

    let cache = CacheStore::new(cache_dir, config.fetch.refresh_hours);
    let removed = cache.clear()?;
    println!(
        "Removed {removed} cached artifacts from {}",
        cache.dir().display()
    );
    Ok(())
}
