//! Archive capability trait and shared handles

use std::sync::{Arc, Mutex};

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;

use crate::elite::Elite;
use crate::error::Result;
use crate::status::AddStatus;

/// Capability set shared by all archive geometries.
///
/// Archives partition measure space and keep at most one current
/// occupant per cell. All mutation happens through [`Archive::add`] on
/// the orchestrator thread; evaluation workers never touch an archive.
pub trait Archive: Send {
    /// Attempt to insert `(solution, objective, measure)`.
    ///
    /// Returns the insertion status; a rejection is a normal result.
    /// Fails only on dimension mismatches.
    fn add(
        &mut self,
        solution: ArrayView1<'_, f64>,
        objective: f64,
        measure: ArrayView1<'_, f64>,
    ) -> Result<AddStatus>;

    /// Drop all occupants and reset thresholds and score bookkeeping.
    fn clear(&mut self);

    /// Current occupant of the cell containing `measure`, if any.
    fn get(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite>>;

    /// Best solution ever accepted into the cell containing `measure`.
    fn get_elite(&self, measure: ArrayView1<'_, f64>) -> Result<Option<Elite>>;

    /// Snapshot of the best-ever elites, one per occupied cell.
    fn elites(&self) -> Vec<Elite>;

    /// Draw `n` occupants uniformly with replacement, as a D×n matrix.
    ///
    /// Fails with [`QdError::EmptyArchive`](crate::QdError::EmptyArchive)
    /// when no cell is occupied. The RNG is an explicit parameter so the
    /// caller keeps ownership of its stream.
    fn sample(&self, n: usize, rng: &mut StdRng) -> Result<Array2<f64>>;

    /// Number of occupied cells.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn solution_dim(&self) -> usize;

    fn measure_dim(&self) -> usize;

    /// Total cell count of the geometry.
    fn cells(&self) -> usize;

    /// Occupied fraction in `[0, 1]`.
    fn coverage(&self) -> f64;

    /// Maximum occupant objective; `None` when empty.
    fn obj_max(&self) -> Option<f64>;

    /// Mean occupant objective; `None` when empty.
    fn obj_mean(&self) -> Option<f64>;

    /// Sum of `objective - qd_score_offset` over occupied cells.
    fn qd_score(&self) -> f64;

    /// QD score divided by the total cell count.
    fn norm_qd_score(&self) -> f64;

    /// Minimum objective ever passed to `add`, including rejections.
    fn qd_score_offset(&self) -> f64;
}

/// Shared archive handle.
///
/// Emitters hold one of these; several emitters may share a single
/// archive. `tell` calls serialize on the orchestrator thread, so the
/// mutex is uncontended in the supported execution model.
pub type SharedArchive = Arc<Mutex<dyn Archive>>;

/// Wrap an archive into a [`SharedArchive`] handle.
pub fn shared<A: Archive + 'static>(archive: A) -> SharedArchive {
    Arc::new(Mutex::new(archive))
}
