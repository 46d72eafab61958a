//! Error taxonomy for the post-processing core.
//!
//! Every fatal condition carries the offending path plus enough context
//! (expected vs. actual sizes, parse reason) to be actionable without a
//! debugger. Simulation outputs are generated once and never retried:
//! a missing or short file means an upstream failure and is surfaced
//! immediately.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal errors raised by the post-processing core.
#[derive(Debug, Error)]
pub enum PostError {
    /// Malformed or incomplete declarative input (grid, ignition, sensor
    /// configuration). Aborts the run before any decoding starts.
    #[error("invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// A required file is missing or unreadable.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Declared cell/layer counts disagree with the file size. Signals a
    /// version mismatch between this decoder and the simulation output.
    #[error("{path}: expected {expected} {unit}, found {actual}")]
    DataShape {
        path: PathBuf,
        expected: u64,
        actual: u64,
        unit: &'static str,
    },
}

impl PostError {
    pub(crate) fn config(path: &Path, reason: impl Into<String>) -> Self {
        PostError::Config {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        PostError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn shape(path: &Path, expected: u64, actual: u64, unit: &'static str) -> Self {
        PostError::DataShape {
            path: path.to_path_buf(),
            expected,
            actual,
            unit,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_shape_message_names_sizes() {
        let err = PostError::shape(Path::new("Output/fire_indexes.bin"), 300, 120, "bytes");
        let msg = err.to_string();
        assert!(msg.contains("fire_indexes.bin"));
        assert!(msg.contains("300"));
        assert!(msg.contains("120"));
    }

    #[test]
    fn test_io_error_preserves_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PostError::io(Path::new("Output/fuels-dens-00000.bin"), inner);
        assert!(err.to_string().contains("fuels-dens-00000.bin"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
