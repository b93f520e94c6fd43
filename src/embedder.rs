//! The embedding backend seam.
//!
//! The evaluation core never talks to a model directly; it asks an [`Embedder`]
//! for one embedding per image and propagates whatever error comes back.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::{Embedding, Error, Pipeline, Result};

/// Maps an image file to a fixed-length embedding.
///
/// `&mut self` because backends own an exclusive inference context. Implementors
/// report unreadable images as [`Error::Input`] and model failures as
/// [`Error::Inference`]; they must never substitute a zero vector.
pub trait Embedder {
    fn embed(&mut self, path: &Path) -> Result<Embedding>;
}

impl<E: Embedder + ?Sized> Embedder for &mut E {
    fn embed(&mut self, path: &Path) -> Result<Embedding> {
        (**self).embed(path)
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&mut self, path: &Path) -> Result<Embedding> {
        (**self).embed(path)
    }
}

impl Embedder for Pipeline {
    fn embed(&mut self, path: &Path) -> Result<Embedding> {
        let img = Pipeline::load_image(path).map_err(|e| Error::input(path, &e))?;
        self.encode(&img).map_err(|e| Error::inference(path, &e))
    }
}

/// Cloneable handle that serializes access to a single backend.
///
/// Use it when several evaluation runs on different threads must share one
/// accelerator: each run gets its own clone and every `embed` call holds the
/// lock for its whole duration.
pub struct SharedEmbedder<E> {
    inner: Arc<Mutex<E>>,
}

impl<E> SharedEmbedder<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(embedder)),
        }
    }
}

impl<E> Clone for SharedEmbedder<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Embedder> Embedder for SharedEmbedder<E> {
    fn embed(&mut self, path: &Path) -> Result<Embedding> {
        let mut guard = self.inner.lock().map_err(|_| Error::Inference {
            path: path.to_path_buf(),
            reason: "embedder lock poisoned by a panicked run".to_string(),
        })?;
        guard.embed(path)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::TableEmbedder;
    use super::*;
    use std::thread;

    #[test]
    fn test_shared_embedder_serializes_clones() {
        let shared = SharedEmbedder::new(TableEmbedder::default().with("a.png", &[1.0, 2.0]));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mut handle = shared.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        handle.embed(Path::new("a.png")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let calls = shared.inner.lock().unwrap().calls;
        assert_eq!(calls, 40);
    }

    /// Panics on its first call, then behaves.
    struct CrashOnce {
        crashed: bool,
    }

    impl Embedder for CrashOnce {
        fn embed(&mut self, _path: &Path) -> Result<Embedding> {
            if !self.crashed {
                self.crashed = true;
                panic!("backend crashed mid-inference");
            }
            Ok(Embedding::from_vec(vec![1.0]))
        }
    }

    #[test]
    fn test_poisoned_lock_is_inference_error() {
        let shared = SharedEmbedder::new(CrashOnce { crashed: false });

        let mut crashing = shared.clone();
        let joined = thread::spawn(move || crashing.embed(Path::new("a.png"))).join();
        assert!(joined.is_err(), "first call should have panicked");

        let mut survivor = shared.clone();
        let err = survivor.embed(Path::new("b.png")).unwrap_err();
        match err {
            Error::Inference { path, reason } => {
                assert_eq!(path, Path::new("b.png"));
                assert!(reason.contains("poisoned"), "{reason}");
            }
            other => panic!("expected inference error, got {other:?}"),
        }
    }

    #[test]
    fn test_errors_pass_through() {
        let mut shared = SharedEmbedder::new(TableEmbedder::default());
        let err = shared.embed(Path::new("missing.png")).unwrap_err();
        assert!(matches!(err, Error::Inference { .. }));
    }
}
