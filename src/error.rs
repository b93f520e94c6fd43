//! Error taxonomy for an evaluation run.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for facerank operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that aborts an evaluation run.
///
/// Degenerate (zero-norm) similarity pairs are deliberately absent: they are
/// excluded from ranking and counted, not raised.
#[derive(Error, Debug)]
pub enum Error {
    /// A precondition was violated by the caller (zero probes, rank 0,
    /// mismatched embedding dimensions, duplicate gallery keys).
    #[error("contract violated: {0}")]
    Contract(String),

    /// The embedding backend failed on an image.
    #[error("inference failed for {}: {reason}", .path.display())]
    Inference { path: PathBuf, reason: String },

    /// A dataset image could not be read or decoded.
    #[error("cannot read image {}: {reason}", .path.display())]
    Input { path: PathBuf, reason: String },

    /// The dataset directory is missing or unreadable.
    #[error("cannot read dataset directory {}: {source}", .path.display())]
    Dataset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scoring worker pool could not be started.
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The run was cancelled between probes.
    #[error("evaluation aborted")]
    Aborted,
}

impl Error {
    pub(crate) fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    pub fn inference(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Inference {
            path: path.into(),
            reason: format!("{err:#}"),
        }
    }

    pub fn input(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Input {
            path: path.into(),
            reason: format!("{err:#}"),
        }
    }
}
