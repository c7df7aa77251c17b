//! Error types and handling for epgmerge-core operations.
//!
//! The merge pipeline distinguishes failures by how far they are allowed to
//! propagate:
//!
//! - **Fetch/parse failures** are per-source: the source contributes nothing
//!   and the run continues.
//! - **Record failures** (a channel or programme missing a required
//!   attribute) are per-element: the element is skipped and logged.
//! - **Integrity violations** (duplicate ids, inverted chronology, orphan
//!   references) are not errors at all; the normalization pipeline resolves
//!   them by policy.
//! - **Write failures** are fatal: a half-written guide is worse than no
//!   guide.
//!
//! The `category()` accessor feeds the run summary so skipped sources can be
//! reported by failure class.

use thiserror::Error;

/// The main error type for epgmerge-core operations.
///
/// All public functions in epgmerge-core return `Result<T, Error>`.
/// Conversions from `std::io::Error` and `reqwest::Error` are automatic so
/// that `?` works at the I/O and network boundaries.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers filesystem operations: reading local sources, cache
    /// artifacts, creating output directories, writing the merged guide.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers HTTP fetches of remote sources, including timeouts and
    /// non-success status codes. The underlying `reqwest::Error` is
    /// preserved for detailed connection information.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Parsing operation failed.
    ///
    /// Raised only when a source document is too damaged to recover any
    /// structure from. Individually malformed fragments are repaired or
    /// skipped by the lenient parser and never surface here.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Cache or output storage operation failed.
    ///
    /// Covers cache artifact management beyond basic file I/O: gzip
    /// compression, freshness metadata, temp-file commits.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the error category as a static string for summary reporting.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
        }
    }

}

/// Result type alias for epgmerge-core operations.
pub type Result<T> = std::result::Result<T, Error>;
