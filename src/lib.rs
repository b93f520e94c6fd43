pub mod config;
pub mod dataset;
pub mod embedder;
pub mod error;
pub mod eval;
pub mod gallery;
pub mod matcher;
pub mod report;

pub use dataset::{LabeledImage, Split};
pub use embedder::{Embedder, SharedEmbedder};
pub use error::{Error, Result};
pub use eval::{embed_probes, evaluate_rank_n, AbortFlag, Evaluator, Probe};
pub use gallery::{GalleryEntry, GalleryIndex};
pub use report::{RankAccuracy, Report};

// Re-export vision types for convenience
pub use facerank_vision::{Embedding, Pipeline, Preprocess};
