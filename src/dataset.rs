//! Dataset enumeration and the gallery/probe split.

use std::path::{Path, PathBuf};

use log::debug;

use crate::{Error, Result};

/// An image path with its ground-truth identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub label: String,
}

impl LabeledImage {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    /// Derive the label from the file name: everything before the first `.`.
    ///
    /// Returns `None` for paths without a file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_string_lossy();
        let label = name.split('.').next().unwrap_or_default().to_string();
        Some(Self { path, label })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Images partitioned into enrolled references and queries.
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub gallery: Vec<LabeledImage>,
    pub probes: Vec<LabeledImage>,
}

/// List the regular files of `dir` (no recursion), sorted by path.
///
/// Dotfiles are skipped. A missing or unreadable directory is an error; an
/// empty one yields an empty list.
pub fn load(dir: &Path) -> Result<Vec<LabeledImage>> {
    let io_err = |source: std::io::Error| Error::Dataset {
        path: dir.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            debug!("skipping hidden file {}", path.display());
            continue;
        }
        if let Some(image) = LabeledImage::from_path(path) {
            images.push(image);
        }
    }

    // read_dir order is platform dependent
    images.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("loaded {} images from {}", images.len(), dir.display());
    Ok(images)
}

/// Gallery images are those whose file name contains `marker`; all others are probes.
pub fn split(images: Vec<LabeledImage>, marker: &str) -> Split {
    let (gallery, probes): (Vec<_>, Vec<_>) = images
        .into_iter()
        .partition(|img| img.file_name().contains(marker));
    Split { gallery, probes }
}
