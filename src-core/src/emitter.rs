//! Emitter capability trait and shared ask/tell plumbing

use ndarray::{Array1, Array2};

use crate::archive::{Archive, SharedArchive};
use crate::error::{QdError, Result};
use crate::status::AddStatus;

/// A candidate generator wired to one archive.
///
/// `ask` produces a D×n batch (one candidate per column, clamped to the
/// emitter bounds); `tell` consumes the evaluated batch, inserting into
/// the archive and updating internal state. Both run on the
/// orchestrator thread.
pub trait Emitter: Send {
    fn ask(&mut self, n: usize) -> Array2<f64>;

    fn tell(
        &mut self,
        solutions: &Array2<f64>,
        objectives: &Array1<f64>,
        measures: &Array2<f64>,
    ) -> Result<Vec<AddStatus>>;

    /// Handle to the archive this emitter feeds.
    fn archive(&self) -> &SharedArchive;

    fn solution_dim(&self) -> usize;

    fn measure_dim(&self) -> usize;
}

/// Check that a told batch is shape-consistent; returns the batch size.
pub(crate) fn validate_batch_shapes(
    solution_dim: usize,
    measure_dim: usize,
    solutions: &Array2<f64>,
    objectives: &Array1<f64>,
    measures: &Array2<f64>,
) -> Result<usize> {
    if solutions.nrows() != solution_dim {
        return Err(QdError::DimensionMismatch {
            what: "solution",
            expected: solution_dim,
            actual: solutions.nrows(),
        });
    }
    if measures.nrows() != measure_dim {
        return Err(QdError::DimensionMismatch {
            what: "measure",
            expected: measure_dim,
            actual: measures.nrows(),
        });
    }
    let n = solutions.ncols();
    if objectives.len() != n {
        return Err(QdError::DimensionMismatch {
            what: "objectives",
            expected: n,
            actual: objectives.len(),
        });
    }
    if measures.ncols() != n {
        return Err(QdError::DimensionMismatch {
            what: "measures",
            expected: n,
            actual: measures.ncols(),
        });
    }
    Ok(n)
}

/// Insert every column of a validated batch into the archive.
pub(crate) fn add_batch(
    archive: &SharedArchive,
    solutions: &Array2<f64>,
    objectives: &Array1<f64>,
    measures: &Array2<f64>,
) -> Result<Vec<AddStatus>> {
    let mut archive = archive.lock().unwrap();
    let mut statuses = Vec::with_capacity(solutions.ncols());
    for j in 0..solutions.ncols() {
        statuses.push(archive.add(solutions.column(j), objectives[j], measures.column(j))?);
    }
    Ok(statuses)
}

/// D×n matrix with every column equal to `center`.
pub(crate) fn tile_center(center: &Array1<f64>, n: usize) -> Array2<f64> {
    Array2::from_shape_fn((center.len(), n), |(row, _)| center[row])
}
