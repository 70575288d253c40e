//! Grid archive over measure space
//!
//! The measure space is partitioned into a uniform hyper-rectangular
//! grid. Each cell keeps its current occupant, a replacement threshold
//! updated by an exponential moving average, and the best solution ever
//! accepted (the elite). Bin and cell indices are 1-based: the first
//! bin along every axis maps to cell 1 and the last to cell `C`.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayView1};
use num_traits::NumCast;
use rand::Rng;
use rand::rngs::StdRng;

use crate::archive::Archive;
use crate::elite::Elite;
use crate::error::{QdError, Result};
use crate::status::AddStatus;

/// Element type of archived solutions.
///
/// Objectives, measures and thresholds are always `f64`; only the
/// solution store is generic, so integer-valued search spaces archive
/// without widening.
pub trait Scalar:
    Copy + PartialOrd + std::fmt::Debug + NumCast + Send + Sync + 'static
{
}

impl<T> Scalar for T where T: Copy + PartialOrd + std::fmt::Debug + NumCast + Send + Sync + 'static {}

/// Configuration for [`GridArchive`].
#[derive(Debug, Clone)]
pub struct GridArchiveBuilder<T: Scalar = f64> {
    solution_dim: usize,
    cells_per_measure: Vec<usize>,
    measure_ranges: Vec<(f64, f64)>,
    learning_rate: f64,
    threshold_min: f64,
    _scalar: std::marker::PhantomData<T>,
}

impl<T: Scalar> GridArchiveBuilder<T> {
    pub fn new(solution_dim: usize) -> Self {
        Self {
            solution_dim,
            cells_per_measure: Vec::new(),
            measure_ranges: Vec::new(),
            learning_rate: 1.0,
            threshold_min: f64::NEG_INFINITY,
            _scalar: std::marker::PhantomData,
        }
    }

    /// Bin counts per measure axis.
    pub fn cells_per_measure(mut self, dims: &[usize]) -> Self {
        self.cells_per_measure = dims.to_vec();
        self
    }

    /// `(lower, upper)` measure range per axis, `lower < upper`.
    pub fn measure_ranges(mut self, ranges: &[(f64, f64)]) -> Self {
        self.measure_ranges = ranges.to_vec();
        self
    }

    /// Threshold EMA coefficient α; 1.0 makes thresholds track the best
    /// accepted objective exactly.
    pub fn learning_rate(mut self, alpha: f64) -> Self {
        self.learning_rate = alpha;
        self
    }

    /// Floor on every cell threshold.
    pub fn threshold_min(mut self, min: f64) -> Self {
        self.threshold_min = min;
        self
    }

    pub fn build(self) -> Result<GridArchive<T>> {
        if self.solution_dim == 0 {
            return Err(QdError::InvalidArgument(
                "solution_dim must be positive".into(),
            ));
        }
        if self.cells_per_measure.is_empty() {
            return Err(QdError::InvalidArgument(
                "cells_per_measure must not be empty".into(),
            ));
        }
        if self.cells_per_measure.iter().any(|&k| k == 0) {
            return Err(QdError::InvalidArgument(
                "cells_per_measure entries must be positive".into(),
            ));
        }
        if self.measure_ranges.len() != self.cells_per_measure.len() {
            return Err(QdError::DimensionMismatch {
                what: "measure_ranges",
                expected: self.cells_per_measure.len(),
                actual: self.measure_ranges.len(),
            });
        }
        for (i, &(lo, hi)) in self.measure_ranges.iter().enumerate() {
            if !(lo < hi) {
                return Err(QdError::InvalidArgument(format!(
                    "measure range {i} is inverted or degenerate: ({lo}, {hi})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(QdError::InvalidArgument(format!(
                "learning_rate must be in [0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.learning_rate != 1.0 && self.threshold_min.is_infinite() {
            // The EMA blend needs finite operands once a cell is seeded.
            return Err(QdError::InvalidArgument(
                "learning_rate != 1.0 requires a finite threshold_min".into(),
            ));
        }

        let measure_dim = self.cells_per_measure.len();
        let cells: usize = self.cells_per_measure.iter().product();
        let boundaries = self
            .cells_per_measure
            .iter()
            .zip(self.measure_ranges.iter())
            .map(|(&k, &(lo, hi))| {
                let step = (hi - lo) / k as f64;
                (1..k).map(|j| lo + j as f64 * step).collect()
            })
            .collect();

        Ok(GridArchive {
            solution_dim: self.solution_dim,
            measure_dim,
            dims: self.cells_per_measure,
            boundaries,
            learning_rate: self.learning_rate,
            threshold_min: self.threshold_min,
            cells,
            solutions: Array2::from_shape_fn((self.solution_dim, cells), |_| {
                T::from(0).expect("zero representable in scalar type")
            }),
            objectives: Array1::from_elem(cells, f64::NEG_INFINITY),
            measures: Array2::zeros((measure_dim, cells)),
            thresholds: Array1::from_elem(cells, self.threshold_min),
            occupied: vec![false; cells],
            occupied_cells: Vec::new(),
            elites: HashMap::new(),
            qd_score_offset: 0.0,
        })
    }
}

/// Grid archive storing at most one occupant per cell.
#[derive(Debug)]
pub struct GridArchive<T: Scalar = f64> {
    solution_dim: usize,
    measure_dim: usize,
    dims: Vec<usize>,
    /// Interior bin edges per axis, `K_i - 1` each.
    boundaries: Vec<Vec<f64>>,
    learning_rate: f64,
    threshold_min: f64,
    cells: usize,
    /// Current occupant solutions, one column per cell (D×C).
    solutions: Array2<T>,
    objectives: Array1<f64>,
    measures: Array2<f64>,
    thresholds: Array1<f64>,
    occupied: Vec<bool>,
    /// 1-based ids of occupied cells, in occupation order.
    occupied_cells: Vec<usize>,
    /// Best-ever elite per occupied cell, keyed by 1-based cell id.
    elites: HashMap<usize, Elite<T>>,
    qd_score_offset: f64,
}

impl<T: Scalar> GridArchive<T> {
    pub fn builder(solution_dim: usize) -> GridArchiveBuilder<T> {
        GridArchiveBuilder::new(solution_dim)
    }

    /// 1-based cell id containing `measure`.
    ///
    /// Bins are computed per axis against the interior edges; an edge
    /// value belongs to the lower bin, and the outermost bins are
    /// half-open toward ±∞. Axes fold row-major:
    /// `idx = b_1 + Σ_{i≥2} (b_i − 1)·∏_{j<i} K_j`.
    pub fn index_of(&self, measure: ArrayView1<'_, f64>) -> Result<usize> {
        if measure.len() != self.measure_dim {
            return Err(QdError::DimensionMismatch {
                what: "measure",
                expected: self.measure_dim,
                actual: measure.len(),
            });
        }
        let mut index = 0usize;
        let mut stride = 1usize;
        for (axis, edges) in self.boundaries.iter().enumerate() {
            let bin = edges.partition_point(|&e| e < measure[axis]) + 1;
            index += (bin - 1) * stride;
            stride *= self.dims[axis];
        }
        Ok(index + 1)
    }

    /// Insert a candidate; see [`AddStatus`] for payload semantics.
    pub fn add(
        &mut self,
        solution: ArrayView1<'_, T>,
        objective: f64,
        measure: ArrayView1<'_, f64>,
    ) -> Result<AddStatus> {
        if solution.len() != self.solution_dim {
            return Err(QdError::DimensionMismatch {
                what: "solution",
                expected: self.solution_dim,
                actual: solution.len(),
            });
        }
        let cell = self.index_of(measure)?;
        self.qd_score_offset = self.qd_score_offset.min(objective);
        let slot = cell - 1;

        if !self.occupied[slot] {
            self.occupied[slot] = true;
            self.occupied_cells.push(cell);
            self.store(slot, solution, objective, measure);
            self.thresholds[slot] = self.threshold_min.max(objective);
            self.elites.insert(
                cell,
                Elite {
                    cell,
                    solution: solution.to_owned(),
                    objective,
                    measure: measure.to_owned(),
                },
            );
            return Ok(AddStatus::New(objective));
        }

        let threshold = self.thresholds[slot];
        if objective > threshold {
            // Improvement is measured against the occupant, not the threshold.
            let improvement = objective - self.objectives[slot];
            self.store(slot, solution, objective, measure);
            let alpha = self.learning_rate;
            self.thresholds[slot] = self
                .threshold_min
                .max((1.0 - alpha) * threshold + alpha * objective);
            let elite = self.elites.get_mut(&cell).expect("occupied cell has elite");
            if objective > elite.objective {
                elite.solution = solution.to_owned();
                elite.objective = objective;
                elite.measure = measure.to_owned();
            }
            Ok(AddStatus::Improve(improvement))
        } else {
            Ok(AddStatus::NotAdded(objective - threshold))
        }
    }

    fn store(
        &mut self,
        slot: usize,
        solution: ArrayView1<'_, T>,
        objective: f64,
        measure: ArrayView1<'_, f64>,
    ) {
        self.solutions.column_mut(slot).assign(&solution);
        self.objectives[slot] = objective;
        self.measures.column_mut(slot).assign(&measure);
    }

    pub fn clear(&mut self) {
        self.occupied.fill(false);
        self.occupied_cells.clear();
        self.elites.clear();
        self.objectives.fill(f64::NEG_INFINITY);
        self.thresholds.fill(self.threshold_min);
        self.qd_score_offset = 0.0;
    }

    /// Current occupant of the cell containing `measure`.
    pub fn get(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite<T>>> {
        let cell = self.index_of(measure)?;
        let slot = cell - 1;
        if !self.occupied[slot] {
            return Ok(None);
        }
        Ok(Some(Elite {
            cell,
            solution: self.solutions.column(slot).to_owned(),
            objective: self.objectives[slot],
            measure: self.measures.column(slot).to_owned(),
        }))
    }

    /// Best-ever elite of the cell containing `measure`.
    pub fn get_elite(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite<T>>> {
        let cell = self.index_of(measure)?;
        Ok(self.elites.get(&cell).cloned())
    }

    /// Best-ever elites in cell-occupation order.
    pub fn elites(&self) -> Vec<Elite<T>> {
        self.occupied_cells
            .iter()
            .map(|cell| self.elites[cell].clone())
            .collect()
    }

    /// Draw `n` occupied cell ids uniformly with replacement.
    pub fn sample_cells(&self, n: usize, rng: &mut StdRng) -> Result<Vec<usize>> {
        if self.occupied_cells.is_empty() {
            return Err(QdError::EmptyArchive);
        }
        Ok((0..n)
            .map(|_| self.occupied_cells[rng.random_range(0..self.occupied_cells.len())])
            .collect())
    }

    /// Draw `n` occupant solutions uniformly with replacement (D×n).
    pub fn sample(&self, n: usize, rng: &mut StdRng) -> Result<Array2<T>> {
        let cells = self.sample_cells(n, rng)?;
        Ok(Array2::from_shape_fn((self.solution_dim, n), |(row, j)| {
            self.solutions[(row, cells[j] - 1)]
        }))
    }

    pub fn len(&self) -> usize {
        self.occupied_cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied_cells.is_empty()
    }

    pub fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    pub fn measure_dim(&self) -> usize {
        self.measure_dim
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn threshold_min(&self) -> f64 {
        self.threshold_min
    }

    /// Current threshold of the cell containing `measure`.
    pub fn threshold_of(&self, measure: ArrayView1<'_, f64>) -> Result<f64> {
        let cell = self.index_of(measure)?;
        Ok(self.thresholds[cell - 1])
    }

    pub fn coverage(&self) -> f64 {
        self.len() as f64 / self.cells as f64
    }

    pub fn obj_max(&self) -> Option<f64> {
        self.occupied_cells
            .iter()
            .map(|&c| self.objectives[c - 1])
            .fold(None, |acc, v| Some(acc.map_or(v, |x| f64::max(x, v))))
    }

    pub fn obj_mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let sum: f64 = self
            .occupied_cells
            .iter()
            .map(|&c| self.objectives[c - 1])
            .sum();
        Some(sum / self.len() as f64)
    }

    pub fn qd_score(&self) -> f64 {
        self.occupied_cells
            .iter()
            .map(|&c| self.objectives[c - 1] - self.qd_score_offset)
            .sum()
    }

    pub fn norm_qd_score(&self) -> f64 {
        self.qd_score() / self.cells as f64
    }

    pub fn qd_score_offset(&self) -> f64 {
        self.qd_score_offset
    }
}

impl Archive for GridArchive<f64> {
    fn add(
        &mut self,
        solution: ArrayView1<'_, f64>,
        objective: f64,
        measure: ArrayView1<'_, f64>,
    ) -> Result<AddStatus> {
        GridArchive::add(self, solution, objective, measure)
    }

    fn clear(&mut self) {
        GridArchive::clear(self)
    }

    fn get(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite>> {
        GridArchive::get(self, measure)
    }

    fn get_elite(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite>> {
        GridArchive::get_elite(self, measure)
    }

    fn elites(&self) -> Vec<Elite> {
        GridArchive::elites(self)
    }

    fn sample(&self, n: usize, rng: &mut StdRng) -> Result<Array2<f64>> {
        GridArchive::sample(self, n, rng)
    }

    fn len(&self) -> usize {
        GridArchive::len(self)
    }

    fn solution_dim(&self) -> usize {
        GridArchive::solution_dim(self)
    }

    fn measure_dim(&self) -> usize {
        GridArchive::measure_dim(self)
    }

    fn cells(&self) -> usize {
        GridArchive::cells(self)
    }

    fn coverage(&self) -> f64 {
        GridArchive::coverage(self)
    }

    fn obj_max(&self) -> Option<f64> {
        GridArchive::obj_max(self)
    }

    fn obj_mean(&self) -> Option<f64> {
        GridArchive::obj_mean(self)
    }

    fn qd_score(&self) -> f64 {
        GridArchive::qd_score(self)
    }

    fn norm_qd_score(&self) -> f64 {
        GridArchive::norm_qd_score(self)
    }

    fn qd_score_offset(&self) -> f64 {
        GridArchive::qd_score_offset(self)
    }
}
