//! Elite records

use ndarray::Array1;
use serde::Serialize;

/// The best solution ever accepted into an archive cell.
///
/// `cell` is the 1-based cell id for grid archives and the position in
/// the stored set for Pareto archives (stable only until the next
/// mutation).
#[derive(Debug, Clone, Serialize)]
pub struct Elite<T = f64> {
    pub cell: usize,
    pub solution: Array1<T>,
    pub objective: f64,
    pub measure: Array1<f64>,
}
