use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Preprocess;

pub static CONFIG_PATH: Lazy<&'static Path> =
    Lazy::new(|| Path::new(option_env!("FACERANK_CONFIG_PATH").unwrap_or("facerank.toml")));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Images whose file name contains this marker form the gallery.
    pub gallery_marker: String,
    pub ranks: Vec<usize>,
    /// Scoring threads; 0 means one per CPU.
    pub workers: usize,
    /// ONNX recognition model.
    pub model: Option<PathBuf>,
    pub preprocess: PreprocessConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gallery_marker: "normal".to_string(),
            ranks: vec![1, 2, 3],
            workers: 0,
            model: None,
            preprocess: PreprocessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub size: u32,
    pub mean: f32,
    pub scale: f32,
    pub bgr: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        let p = Preprocess::default();
        Self {
            size: p.size,
            mean: p.mean,
            scale: p.scale,
            bgr: p.bgr,
        }
    }
}

impl From<PreprocessConfig> for Preprocess {
    fn from(c: PreprocessConfig) -> Self {
        Self {
            size: c.size,
            mean: c.mean,
            scale: c.scale,
            bgr: c.bgr,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.gallery_marker.is_empty() {
            anyhow::bail!("gallery_marker must not be empty");
        }
        if self.ranks.is_empty() {
            anyhow::bail!("at least one rank is required");
        }
        if self.ranks.contains(&0) {
            anyhow::bail!("ranks must be >= 1, got {:?}", self.ranks);
        }
        if self.preprocess.size == 0 {
            anyhow::bail!("preprocess.size must be positive");
        }
        if !self.preprocess.scale.is_finite() || self.preprocess.scale == 0.0 {
            anyhow::bail!("preprocess.scale must be finite and nonzero");
        }
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("none.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.gallery_marker, "normal");
        assert_eq!(cfg.ranks, [1, 2, 3]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facerank.toml");
        std::fs::write(
            &path,
            "gallery_marker = \"centerlight\"\n[preprocess]\nbgr = true\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.gallery_marker, "centerlight");
        assert_eq!(cfg.ranks, [1, 2, 3]);
        assert!(cfg.preprocess.bgr);
        assert_eq!(cfg.preprocess.size, 112);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/facerank.toml");
        let cfg = Config {
            model: Some(PathBuf::from("model/w600k_mbf.onnx")),
            workers: 4,
            ..Config::default()
        };
        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        let bad = Config {
            ranks: vec![1, 0],
            ..Config::default()
        };
        assert!(bad.validate().is_err());
        let bad = Config {
            gallery_marker: String::new(),
            ..Config::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facerank.toml");
        std::fs::write(&path, "ranks = \"one\"").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
