pub mod face;
pub mod model;
pub mod pipeline;

// Re-export commonly used types
pub use face::{Embedding, Preprocess};
pub use pipeline::Pipeline;
