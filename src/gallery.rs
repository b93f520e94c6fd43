//! Precomputed embeddings for the enrolled (gallery) images.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::{dataset::LabeledImage, Embedder, Embedding, Error, Result};

#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub path: PathBuf,
    pub label: String,
    pub embedding: Embedding,
}

/// Read-only gallery, built once per evaluation run.
///
/// Entries keep the order of the images passed to [`GalleryIndex::build`]; that
/// order decides ties during ranking. There is no insertion or removal after
/// construction, so the index can be shared across worker threads as `&GalleryIndex`.
#[derive(Debug, Default)]
pub struct GalleryIndex {
    entries: Vec<GalleryEntry>,
    by_path: HashMap<PathBuf, usize>,
    dim: Option<usize>,
}

impl GalleryIndex {
    /// Embed every gallery image exactly once.
    ///
    /// Any embedder failure fails the whole build; a partially built gallery
    /// would skew every rank computed against it.
    pub fn build<E: Embedder + ?Sized>(images: &[LabeledImage], embedder: &mut E) -> Result<Self> {
        let mut index = Self {
            entries: Vec::with_capacity(images.len()),
            by_path: HashMap::with_capacity(images.len()),
            dim: None,
        };

        for image in images {
            if index.by_path.contains_key(&image.path) {
                return Err(Error::contract(format!(
                    "duplicate gallery image {}",
                    image.path.display()
                )));
            }

            let embedding = embedder.embed(&image.path)?;
            match index.dim {
                None => index.dim = Some(embedding.dim()),
                Some(dim) if dim != embedding.dim() => {
                    return Err(Error::contract(format!(
                        "gallery image {} has embedding dimension {}, expected {}",
                        image.path.display(),
                        embedding.dim(),
                        dim
                    )));
                }
                Some(_) => {}
            }
            if embedding.vector.iter().all(|&x| x == 0.0) {
                warn!(
                    "gallery image {} has a zero-norm embedding and can never match",
                    image.path.display()
                );
            }
            debug!("embedded gallery image {} ({})", image.path.display(), image.label);

            index.by_path.insert(image.path.clone(), index.entries.len());
            index.entries.push(GalleryEntry {
                path: image.path.clone(),
                label: image.label.clone(),
                embedding,
            });
        }

        info!(
            "Gallery built: {} entries, dimension {}",
            index.len(),
            index.dim.map_or_else(|| "-".to_string(), |d| d.to_string())
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by all entries; `None` for an empty gallery.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn get(&self, path: &Path) -> Option<&GalleryEntry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GalleryEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a GalleryIndex {
    type Item = &'a GalleryEntry;
    type IntoIter = std::slice::Iter<'a, GalleryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
