use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;

use crate::face::{self, Embedding, Preprocess};

/// Owned inference context: one recognition session plus its preprocessing.
///
/// Every evaluation run constructs its own `Pipeline`; nothing is shared
/// process-wide.
pub struct Pipeline {
    pub encoder: Session,
    pub preprocess: Preprocess,
}

impl Pipeline {
    pub fn new(model: &Path, preprocess: Preprocess) -> Result<Self> {
        Ok(Self {
            encoder: crate::model::recog_session(model)?,
            preprocess,
        })
    }

    /// Decode an image file, sniffing the format from its contents.
    pub fn load_image(path: &Path) -> Result<DynamicImage> {
        image::ImageReader::open(path)
            .with_context(|| format!("opening image {}", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("reading image {}", path.display()))?
            .decode()
            .with_context(|| format!("decoding image {}", path.display()))
    }

    /// Run the recognition model on an already decoded face image.
    pub fn encode(&mut self, img: &DynamicImage) -> Result<Embedding> {
        face::encode_face(&mut self.encoder, img, &self.preprocess).context("encoding face")
    }

    /// Load and encode in one step (convenience method)
    pub fn extract_embedding(&mut self, path: &Path) -> Result<Embedding> {
        let img = Self::load_image(path)?;
        self.encode(&img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_error() {
        let result = Pipeline::new(Path::new("does/not/exist.onnx"), Preprocess::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_image_is_error() {
        assert!(Pipeline::load_image(Path::new("does/not/exist.png")).is_err());
    }
}
