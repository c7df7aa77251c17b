//! Command implementations for the epgmerge CLI.

mod clear;
mod merge;

pub use clear::execute as clear_cache;
pub use merge::execute as merge;
