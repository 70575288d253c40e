//! Per-batch archive statistics
//!
//! Schedulers aggregate their report archives into a [`StatsRecord`]
//! every `stats_frequency` batches and emit it as a single JSON line at
//! INFO level through the `log` facade. Sinks are the host's concern.

use log::info;
use serde::Serialize;

use crate::archive::{Archive, SharedArchive};

/// How much of the record is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    #[default]
    Verbose,
    Compact,
}

/// Aggregate archive metrics at a batch boundary.
///
/// The optional fields are populated in `Verbose` mode only and omitted
/// from the JSON line otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct StatsRecord {
    pub batch: usize,
    pub total_evaluations: usize,
    /// Maximum `obj_max` across archives; `None` while all are empty.
    pub best_objective: Option<f64>,
    /// Mean coverage across archives.
    pub coverage: f64,
    /// Sum of QD scores across archives.
    pub total_qd_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_objective: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_qd_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cells: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_cells: Option<usize>,
}

/// Aggregates a fixed list of archives into [`StatsRecord`]s.
pub struct StatsReporter {
    archives: Vec<SharedArchive>,
    mode: ReportMode,
}

impl StatsReporter {
    pub fn new(archives: Vec<SharedArchive>, mode: ReportMode) -> Self {
        Self { archives, mode }
    }

    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    pub fn archives(&self) -> &[SharedArchive] {
        &self.archives
    }

    /// Snapshot the archives at a batch boundary.
    pub fn report(&self, batch: usize, total_evaluations: usize) -> StatsRecord {
        let count = self.archives.len().max(1) as f64;
        let mut best_objective: Option<f64> = None;
        let mut coverage = 0.0;
        let mut total_qd_score = 0.0;
        let mut objective_sum = 0.0;
        let mut objective_count = 0usize;
        let mut norm_qd_sum = 0.0;
        let mut total_cells = 0usize;
        let mut filled_cells = 0usize;

        for handle in &self.archives {
            let archive = handle.lock().unwrap();
            if let Some(max) = archive.obj_max() {
                best_objective = Some(best_objective.map_or(max, |b: f64| b.max(max)));
            }
            if let Some(mean) = archive.obj_mean() {
                objective_sum += mean;
                objective_count += 1;
            }
            coverage += archive.coverage();
            total_qd_score += archive.qd_score();
            norm_qd_sum += archive.norm_qd_score();
            total_cells += archive.cells();
            filled_cells += archive.len();
        }

        let verbose = self.mode == ReportMode::Verbose;
        StatsRecord {
            batch,
            total_evaluations,
            best_objective,
            coverage: coverage / count,
            total_qd_score,
            mean_objective: if verbose && objective_count > 0 {
                Some(objective_sum / objective_count as f64)
            } else {
                None
            },
            normalized_qd_score: verbose.then_some(norm_qd_sum / count),
            total_cells: verbose.then_some(total_cells),
            filled_cells: verbose.then_some(filled_cells),
        }
    }

    /// Emit a record on the process logging sink.
    pub fn log(&self, record: &StatsRecord) {
        if let Ok(line) = serde_json::to_string(record) {
            info!(target: "qdex::progress", "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::shared;
    use crate::grid_archive::GridArchive;
    use ndarray::array;

    fn archive_with(points: &[(f64, [f64; 2])]) -> SharedArchive {
        let handle = shared(
            GridArchive::<f64>::builder(2)
                .cells_per_measure(&[10, 10])
                .measure_ranges(&[(0.0, 1.0), (0.0, 1.0)])
                .build()
                .unwrap(),
        );
        {
            let mut archive = handle.lock().unwrap();
            for &(objective, measure) in points {
                archive
                    .add(
                        array![0.0, 0.0].view(),
                        objective,
                        array![measure[0], measure[1]].view(),
                    )
                    .unwrap();
            }
        }
        handle
    }

    #[test]
    fn test_verbose_record_has_all_fields() {
        let a = archive_with(&[(1.0, [0.1, 0.1]), (3.0, [0.9, 0.9])]);
        let b = archive_with(&[(2.0, [0.5, 0.5])]);
        let reporter = StatsReporter::new(vec![a, b], ReportMode::Verbose);
        let record = reporter.report(4, 40);

        assert_eq!(record.batch, 4);
        assert_eq!(record.total_evaluations, 40);
        assert_eq!(record.best_objective, Some(3.0));
        assert!((record.coverage - (0.02 + 0.01) / 2.0).abs() < 1e-12);
        assert_eq!(record.total_qd_score, 6.0);
        assert_eq!(record.mean_objective, Some((2.0 + 2.0) / 2.0));
        assert_eq!(record.total_cells, Some(200));
        assert_eq!(record.filled_cells, Some(3));
        assert!(record.normalized_qd_score.is_some());
    }

    #[test]
    fn test_compact_record_omits_verbose_fields() {
        let a = archive_with(&[(1.0, [0.1, 0.1])]);
        let reporter = StatsReporter::new(vec![a], ReportMode::Compact);
        let record = reporter.report(1, 10);
        assert!(record.mean_objective.is_none());
        assert!(record.normalized_qd_score.is_none());
        assert!(record.total_cells.is_none());
        assert!(record.filled_cells.is_none());

        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains("mean_objective"));
        assert!(line.contains("total_qd_score"));
    }

    #[test]
    fn test_empty_archives_yield_null_best() {
        let a = archive_with(&[]);
        let reporter = StatsReporter::new(vec![a], ReportMode::Verbose);
        let record = reporter.report(1, 0);
        assert_eq!(record.best_objective, None);
        assert_eq!(record.coverage, 0.0);
        assert_eq!(record.mean_objective, None);
    }
}
