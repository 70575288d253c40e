//! Pareto archive: a non-dominated set over `(objective, measure…)`
//!
//! Unlike the grid archive there is no fixed geometry; the archive keeps
//! every point not dominated by another stored point, all components
//! maximized.

use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::rngs::StdRng;

use crate::archive::Archive;
use crate::elite::Elite;
use crate::error::{QdError, Result};
use crate::status::AddStatus;

struct Member {
    solution: Array1<f64>,
    objective: f64,
    measure: Array1<f64>,
}

/// Archive of mutually non-dominated `(objective, measure…)` points.
pub struct ParetoArchive {
    solution_dim: usize,
    measure_dim: usize,
    members: Vec<Member>,
    qd_score_offset: f64,
}

impl ParetoArchive {
    pub fn new(solution_dim: usize, measure_dim: usize) -> Result<Self> {
        if solution_dim == 0 || measure_dim == 0 {
            return Err(QdError::InvalidArgument(
                "solution_dim and measure_dim must be positive".into(),
            ));
        }
        Ok(Self {
            solution_dim,
            measure_dim,
            members: Vec::new(),
            qd_score_offset: 0.0,
        })
    }

    /// True when `a` dominates `b`: componentwise ≥ over
    /// `(objective, measure…)` with at least one strict inequality.
    fn dominates(a: (f64, ArrayView1<'_, f64>), b: (f64, ArrayView1<'_, f64>)) -> bool {
        let mut strict = a.0 > b.0;
        if a.0 < b.0 {
            return false;
        }
        for (&ma, &mb) in a.1.iter().zip(b.1.iter()) {
            if ma < mb {
                return false;
            }
            strict |= ma > mb;
        }
        strict
    }

    fn member_elite(&self, index: usize) -> Elite {
        let member = &self.members[index];
        Elite {
            cell: index,
            solution: member.solution.clone(),
            objective: member.objective,
            measure: member.measure.clone(),
        }
    }
}

impl Archive for ParetoArchive {
    fn add(
        &mut self,
        solution: ArrayView1<'_, f64>,
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
        if measure.len() != self.measure_dim {
            return Err(QdError::DimensionMismatch {
                what: "measure",
                expected: self.measure_dim,
                actual: measure.len(),
            });
        }
        self.qd_score_offset = self.qd_score_offset.min(objective);

        let mut dominated = Vec::new();
        for (index, member) in self.members.iter().enumerate() {
            let stored = (member.objective, member.measure.view());
            if Self::dominates(stored, (objective, measure)) {
                return Ok(AddStatus::NotAdded(objective));
            }
            if Self::dominates((objective, measure), stored) {
                dominated.push(index);
            }
        }

        // Remove in descending index order so earlier indices stay valid.
        for &index in dominated.iter().rev() {
            self.members.swap_remove(index);
        }
        self.members.push(Member {
            solution: solution.to_owned(),
            objective,
            measure: measure.to_owned(),
        });

        if dominated.is_empty() {
            Ok(AddStatus::New(objective))
        } else {
            Ok(AddStatus::Improve(objective))
        }
    }

    fn clear(&mut self) {
        self.members.clear();
        self.qd_score_offset = 0.0;
    }

    /// Stored point whose measure is closest in squared Euclidean
    /// distance.
    fn get(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite>> {
        if measure.len() != self.measure_dim {
            return Err(QdError::DimensionMismatch {
                what: "measure",
                expected: self.measure_dim,
                actual: measure.len(),
            });
        }
        let mut best: Option<(usize, f64)> = None;
        for (index, member) in self.members.iter().enumerate() {
            let dist: f64 = member
                .measure
                .iter()
                .zip(measure.iter())
                .map(|(&a, &b)| (a - b) * (a - b))
                .sum();
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((index, dist));
            }
        }
        Ok(best.map(|(index, _)| self.member_elite(index)))
    }

    fn get_elite(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite>> {
        self.get(measure)
    }

    fn elites(&self) -> Vec<Elite> {
        (0..self.members.len())
            .map(|index| self.member_elite(index))
            .collect()
    }

    fn sample(&self, n: usize, rng: &mut StdRng) -> Result<Array2<f64>> {
        if self.members.is_empty() {
            return Err(QdError::EmptyArchive);
        }
        let picks: Vec<usize> = (0..n)
            .map(|_| rng.random_range(0..self.members.len()))
            .collect();
        Ok(Array2::from_shape_fn((self.solution_dim, n), |(row, j)| {
            self.members[picks[j]].solution[row]
        }))
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    fn measure_dim(&self) -> usize {
        self.measure_dim
    }

    /// A Pareto set has no fixed cell budget; every stored point counts
    /// as one cell.
    fn cells(&self) -> usize {
        self.members.len()
    }

    fn coverage(&self) -> f64 {
        if self.members.is_empty() { 0.0 } else { 1.0 }
    }

    fn obj_max(&self) -> Option<f64> {
        self.members
            .iter()
            .map(|m| m.objective)
            .fold(None, |acc, v| Some(acc.map_or(v, |x| f64::max(x, v))))
    }

    fn obj_mean(&self) -> Option<f64> {
        if self.members.is_empty() {
            return None;
        }
        let sum: f64 = self.members.iter().map(|m| m.objective).sum();
        Some(sum / self.members.len() as f64)
    }

    fn qd_score(&self) -> f64 {
        self.members
            .iter()
            .map(|m| m.objective - self.qd_score_offset)
            .sum()
    }

    fn norm_qd_score(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.qd_score() / self.members.len() as f64
    }

    fn qd_score_offset(&self) -> f64 {
        self.qd_score_offset
    }
}
