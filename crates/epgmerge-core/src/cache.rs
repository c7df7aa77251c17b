//! File-backed cache for fetched source content.
//!
//! One artifact per source, named deterministically from the source
//! address and always stored gzip-compressed regardless of the source's
//! native compression. Freshness is a time-to-live policy on the
//! artifact's modification time. Distinct sources that sanitize to the
//! same key overwrite each other; that collision is an accepted
//! limitation.

use crate::{Error, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Cache store rooted at a single directory with a TTL freshness policy.
pub struct CacheStore {
    dir: PathBuf,
    ttl_hours: u32,
}

impl CacheStore {
    /// Creates a cache store. The directory is created lazily on first
    /// store, not here, so a read-only run against a warm cache never
    /// needs write access.
    #[must_use]
    pub fn new(dir: PathBuf, ttl_hours: u32) -> Self {
        Self { dir, ttl_hours }
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Derives the cache key for a source address.
    ///
    /// The key is the URL's host and path with every character outside
    /// `[A-Za-z0-9._-]` replaced by `_`, so it is safe as a filename on
    /// every platform. Addresses that do not parse as URLs or sanitize to
    /// nothing map to `default.xml`.
    #[must_use]
    pub fn cache_key(source: &str) -> String {
        let Ok(url) = url::Url::parse(source) else {
            return "default.xml".to_string();
        };
        let mut raw = url.host_str().unwrap_or("").to_string();
        if let Some(port) = url.port() {
            raw.push(':');
            raw.push_str(&port.to_string());
        }
        raw.push_str(url.path());

        let mut sanitized: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        // Collapse traversal sequences so the artifact stays rooted in the
        // cache directory no matter what the source address contains.
        while sanitized.contains("..") {
            sanitized = sanitized.replace("..", "_");
        }

        if sanitized.is_empty() {
            "default.xml".to_string()
        } else {
            sanitized
        }
    }

    /// On-disk path of the artifact for a key. Artifacts always carry a
    /// `.gz` suffix; keys derived from `.gz` URLs already end with one.
    #[must_use]
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        if key.to_ascii_lowercase().ends_with(".gz") {
            self.dir.join(key)
        } else {
            self.dir.join(format!("{key}.gz"))
        }
    }

    /// Whether a fresh artifact exists for the key.
    ///
    /// Fresh means the artifact's modification time plus the configured
    /// TTL is still in the future.
    #[must_use]
    pub fn fresh(&self, key: &str) -> bool {
        let path = self.artifact_path(key);
        let Ok(metadata) = fs::metadata(&path) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        let ttl = Duration::from_secs(u64::from(self.ttl_hours) * 3600);
        match modified.checked_add(ttl) {
            Some(deadline) => deadline > SystemTime::now(),
            None => false,
        }
    }

    /// Persists fetched content for a key.
    ///
    /// `already_gzipped` marks payloads that arrived compressed (the
    /// source URL ended in `.gz`); they are stored as-is. Everything else
    /// is compressed here. Written via a temp file and rename so a
    /// crashed run never leaves a truncated artifact behind.
    pub fn store(&self, key: &str, content: &[u8], already_gzipped: bool) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Storage(format!("Failed to create cache directory: {e}")))?;

        let path = self.artifact_path(key);
        let tmp_path = path.with_extension("tmp");

        if already_gzipped {
            fs::write(&tmp_path, content)
                .map_err(|e| Error::Storage(format!("Failed to write cache artifact: {e}")))?;
        } else {
            let file = fs::File::create(&tmp_path)
                .map_err(|e| Error::Storage(format!("Failed to create cache artifact: {e}")))?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder
                .write_all(content)
                .map_err(|e| Error::Storage(format!("Failed to compress cache artifact: {e}")))?;
            encoder
                .finish()
                .map_err(|e| Error::Storage(format!("Failed to flush cache artifact: {e}")))?;
        }

        fs::rename(&tmp_path, &path)
            .map_err(|e| Error::Storage(format!("Failed to commit cache artifact: {e}")))?;

        debug!("Cached {} at {}", key, path.display());
        Ok(path)
    }

    /// Loads and decompresses the artifact for a key.
    pub fn load(&self, key: &str) -> Result<String> {
        let path = self.artifact_path(key);
        let raw = fs::read(&path)
            .map_err(|e| Error::Storage(format!("Failed to read cache artifact: {e}")))?;
        decode_gzip(&raw)
    }

    /// Removes all cache artifacts, returning how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| Error::Storage(format!("Failed to read cache directory: {e}")))?;

        let mut removed = 0;
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Storage(format!("Failed to list cache entry: {e}")))?;
            let path = entry.path();
            if path.is_file() {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove {}: {e}", path.display()),
                }
            }
        }
        Ok(removed)
    }
}

/// Reads a local source file, transparently decompressing `.gz` files.
///
/// Local sources bypass the cache entirely. Non-UTF-8 bytes are replaced
/// rather than rejected; damaged encodings are the parser's problem, not a
/// reason to drop a whole source.
pub fn read_source_file(path: &Path) -> Result<String> {
    let raw = fs::read(path)?;
    let is_gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gz {
        decode_gzip(&raw)
    } else {
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

fn decode_gzip(raw: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(raw);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Storage(format!("Failed to decompress artifact: {e}")))?;
    Ok(String::from_utf8_lossy(&decoded).into_owned())
}
