use std::fmt;

use serde::Serialize;

/// Rank-N accuracy over a probe set: `hits / total`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankAccuracy {
    pub rank: usize,
    pub hits: usize,
    pub total: usize,
    pub accuracy: f64,
}

impl RankAccuracy {
    /// `total` is never zero; the evaluator rejects empty probe sets first.
    pub(crate) fn new(rank: usize, hits: usize, total: usize) -> Self {
        debug_assert!(total > 0 && hits <= total);
        Self {
            rank,
            hits,
            total,
            accuracy: hits as f64 / total as f64,
        }
    }
}

impl fmt::Display for RankAccuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank {} Accuracy is: {:.6}", self.rank, self.accuracy)
    }
}

/// Outcome of one evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub gallery_size: usize,
    pub probe_count: usize,
    /// Probe/gallery pairs skipped because a similarity was undefined.
    pub degenerate_pairs: usize,
    pub ranks: Vec<RankAccuracy>,
}

impl Report {
    pub fn rank(&self, n: usize) -> Option<&RankAccuracy> {
        self.ranks.iter().find(|r| r.rank == n)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.ranks {
            writeln!(f, "{r}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lines() {
        let report = Report {
            gallery_size: 15,
            probe_count: 4,
            degenerate_pairs: 0,
            ranks: vec![RankAccuracy::new(1, 3, 4), RankAccuracy::new(2, 4, 4)],
        };
        assert_eq!(
            report.to_string(),
            "Rank 1 Accuracy is: 0.750000\nRank 2 Accuracy is: 1.000000\n"
        );
        assert_eq!(report.rank(2).unwrap().hits, 4);
        assert!(report.rank(3).is_none());
    }

    #[test]
    fn test_report_json() {
        let report = Report {
            gallery_size: 1,
            probe_count: 2,
            degenerate_pairs: 1,
            ranks: vec![RankAccuracy::new(1, 1, 2)],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["ranks"][0]["accuracy"], 0.5);
        assert_eq!(value["degenerate_pairs"], 1);
    }
}
