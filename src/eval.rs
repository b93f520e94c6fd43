//! Rank-N identification accuracy over a probe set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    dataset::LabeledImage,
    matcher::{self, Ranking},
    Embedder, Embedding, Error, GalleryIndex, RankAccuracy, Report, Result,
};

/// A probe image together with its embedding, computed once and reused for
/// every rank evaluated.
#[derive(Debug, Clone)]
pub struct Probe {
    pub image: LabeledImage,
    pub embedding: Embedding,
}

/// Cancels a run; checked before each probe.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Embed every probe exactly once, in order.
pub fn embed_probes<E: Embedder + ?Sized>(
    probes: &[LabeledImage],
    embedder: &mut E,
    abort: &AbortFlag,
) -> Result<Vec<Probe>> {
    let mut out = Vec::with_capacity(probes.len());
    for image in probes {
        if abort.is_aborted() {
            return Err(Error::Aborted);
        }
        let embedding = embedder.embed(&image.path)?;
        debug!("embedded probe {} ({})", image.path.display(), image.label);
        out.push(Probe {
            image: image.clone(),
            embedding,
        });
    }
    info!("Embedded {} probe image(s)", out.len());
    Ok(out)
}

/// Embed `probes` and compute their rank-`n` accuracy against `gallery`.
pub fn evaluate_rank_n<E: Embedder + ?Sized>(
    probes: &[LabeledImage],
    gallery: &GalleryIndex,
    embedder: &mut E,
    n: usize,
) -> Result<RankAccuracy> {
    // Reject before spending any inference on the probes
    check_request(probes.len(), &[n])?;
    let probes = embed_probes(probes, embedder, &AbortFlag::default())?;
    Evaluator::new(gallery, 0)?.rank_n_accuracy(&probes, n)
}

fn check_request(probe_count: usize, ranks: &[usize]) -> Result<()> {
    if probe_count == 0 {
        return Err(Error::contract("no probe images to evaluate"));
    }
    if ranks.is_empty() {
        return Err(Error::contract("no ranks requested"));
    }
    if ranks.contains(&0) {
        return Err(Error::contract("rank must be at least 1"));
    }
    Ok(())
}

struct ProbeOutcome {
    hits: Vec<bool>,
    degenerate: usize,
}

/// Scores probes against a read-only gallery on a fixed-size worker pool.
pub struct Evaluator<'g> {
    gallery: &'g GalleryIndex,
    pool: rayon::ThreadPool,
    abort: AbortFlag,
}

impl<'g> Evaluator<'g> {
    /// `workers == 0` starts one worker per available CPU.
    pub fn new(gallery: &'g GalleryIndex, workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("facerank-eval-{i}"))
            .build()?;
        Ok(Self {
            gallery,
            pool,
            abort: AbortFlag::default(),
        })
    }

    pub fn with_abort(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    /// Accuracy for every rank in `ranks`, ranking each probe only once.
    pub fn evaluate(&self, probes: &[Probe], ranks: &[usize]) -> Result<Report> {
        self.check(probes, ranks)?;
        let fast_path = ranks.iter().all(|&n| n == 1);

        let outcomes = self.pool.install(|| {
            probes
                .par_iter()
                .map(|probe| self.score_probe(probe, ranks, fast_path))
                .collect::<Result<Vec<_>>>()
        })?;

        let degenerate_pairs: usize = outcomes.iter().map(|o| o.degenerate).sum();
        if degenerate_pairs > 0 {
            warn!(
                "{} probe/gallery pair(s) had an undefined similarity and were excluded",
                degenerate_pairs
            );
        }

        let ranks: Vec<RankAccuracy> = ranks
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let hits = outcomes.iter().filter(|o| o.hits[i]).count();
                info!("Rank {}: {}/{} probes matched", n, hits, probes.len());
                RankAccuracy::new(n, hits, probes.len())
            })
            .collect();

        Ok(Report {
            gallery_size: self.gallery.len(),
            probe_count: probes.len(),
            degenerate_pairs,
            ranks,
        })
    }

    /// General rank-N path: full sort of the gallery for every probe.
    pub fn rank_n_accuracy(&self, probes: &[Probe], n: usize) -> Result<RankAccuracy> {
        self.check(probes, &[n])?;
        let hits = self.count_hits(probes, |probe| {
            matcher::rank(self.gallery, &probe.embedding).hit(&probe.image.label, n)
        })?;
        Ok(RankAccuracy::new(n, hits, probes.len()))
    }

    /// Rank-1 fast path: tracks only the best match per probe.
    ///
    /// Always equal to `rank_n_accuracy(probes, 1)`.
    pub fn rank1_accuracy(&self, probes: &[Probe]) -> Result<RankAccuracy> {
        self.check(probes, &[1])?;
        let hits = self.count_hits(probes, |probe| {
            matcher::best_match(self.gallery, &probe.embedding).hit(&probe.image.label, 1)
        })?;
        Ok(RankAccuracy::new(1, hits, probes.len()))
    }

    fn check(&self, probes: &[Probe], ranks: &[usize]) -> Result<()> {
        check_request(probes.len(), ranks)?;
        if let Some(dim) = self.gallery.dim() {
            if let Some(p) = probes.iter().find(|p| p.embedding.dim() != dim) {
                return Err(Error::contract(format!(
                    "probe {} has embedding dimension {}, gallery uses {}",
                    p.image.path.display(),
                    p.embedding.dim(),
                    dim
                )));
            }
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.abort.is_aborted() {
            return Err(Error::Aborted);
        }
        Ok(())
    }

    fn count_hits<F>(&self, probes: &[Probe], is_hit: F) -> Result<usize>
    where
        F: Fn(&Probe) -> bool + Sync,
    {
        let hits = self.pool.install(|| {
            probes
                .par_iter()
                .map(|probe| {
                    self.ensure_running()?;
                    Ok(is_hit(probe))
                })
                .collect::<Result<Vec<bool>>>()
        })?;
        Ok(hits.into_iter().filter(|&h| h).count())
    }

    fn score_probe(&self, probe: &Probe, ranks: &[usize], fast_path: bool) -> Result<ProbeOutcome> {
        self.ensure_running()?;

        let ranking: Ranking<'_> = if fast_path {
            matcher::best_match(self.gallery, &probe.embedding)
        } else {
            matcher::rank(self.gallery, &probe.embedding)
        };
        let label = probe.image.label.as_str();
        debug_assert!(
            fast_path
                || ranking.hit(label, 1)
                    == matcher::best_match(self.gallery, &probe.embedding).hit(label, 1),
            "rank-1 fast path disagrees with full ranking"
        );

        if ranking.degenerate > 0 {
            debug!(
                "probe {}: {} degenerate pair(s)",
                probe.image.path.display(),
                ranking.degenerate
            );
        }

        Ok(ProbeOutcome {
            hits: ranks.iter().map(|&n| ranking.hit(label, n)).collect(),
            degenerate: ranking.degenerate,
        })
    }
}
