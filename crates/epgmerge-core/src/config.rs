//! Configuration for a merge run.
//!
//! Configuration is stored in TOML. Source order in the file is meaningful:
//! the first source to define a channel id wins that identity, and the
//! first programme seen for a given channel/start instant wins that slot,
//! so the list doubles as a priority ranking.
//!
//! ## Example
//!
//! ```toml
//! sources = [
//!     "https://example.com/guides/us.xml.gz",
//!     "extras/local-overrides.xml",
//! ]
//!
//! [fetch]
//! refresh_hours = 4
//! timeout_secs = 60
//!
//! [merge]
//! trim = false
//!
//! [output]
//! dir = "output"
//! filename = "merged.xml"
//! gzip = true
//!
//! [paths]
//! cache_dir = "cache"
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration for the merge pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source addresses (URLs or local paths), in priority order.
    pub sources: Vec<String>,
    /// Fetching and cache-freshness settings.
    pub fetch: FetchConfig,
    /// Merge-time behavior.
    pub merge: MergeConfig,
    /// Output location and format.
    pub output: OutputConfig,
    /// Filesystem paths.
    pub paths: PathsConfig,
    /// Generator identity stamped on the output root element.
    pub generator: GeneratorConfig,
}

/// Fetching and cache-freshness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Hours before a cached artifact is considered stale.
    pub refresh_hours: u32,
    /// Per-request network timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            refresh_hours: 4,
            timeout_secs: 60,
        }
    }
}

/// Merge-time behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Drop programmes whose stop instant is already in the past at ingest
    /// time. Lets long-running deployments shed stale history as sources
    /// are re-ingested.
    pub trim: bool,
}

/// Output location and format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the merged guide is written to; created if absent.
    pub dir: PathBuf,
    /// Base filename of the merged guide.
    pub filename: String,
    /// Gzip-compress the output (`.gz` is appended to the filename).
    pub gzip: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            filename: "merged.xml".to_string(),
            gzip: true,
        }
    }
}

impl OutputConfig {
    /// Full path of the output file, including the `.gz` suffix when
    /// compression is enabled.
    #[must_use]
    pub fn target_path(&self) -> PathBuf {
        if self.gzip {
            self.dir.join(format!("{}.gz", self.filename))
        } else {
            self.dir.join(&self.filename)
        }
    }
}

/// Filesystem paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Cache directory for fetched sources. Defaults to the platform cache
    /// directory when unset.
    pub cache_dir: Option<PathBuf>,
}

impl PathsConfig {
    /// Resolves the cache directory, falling back to the platform default
    /// (`~/.cache/epgmerge` on Linux) and finally to a relative `cache/`.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "epgmerge")
            .map_or_else(|| PathBuf::from("cache"), |dirs| dirs.cache_dir().to_path_buf())
    }
}

/// Generator identity stamped on the output root element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// `generator-info-name` value.
    pub name: String,
    /// `generator-info-url` value.
    pub url: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            name: concat!("epgmerge/", env!("CARGO_PKG_VERSION")).to_string(),
            url: "https://github.com/epgmerge/epgmerge".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// An unreadable or invalid file is a hard error; a merge run with a
    /// half-understood source list would silently drop guide data.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }
}
