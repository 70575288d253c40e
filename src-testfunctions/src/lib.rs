//! Benchmark objectives for QD optimization
//!
//! Each function maps a solution vector to an [`Evaluation`]: a scalar
//! objective (higher is better) plus a behavioral measure. Unless noted
//! otherwise the measure is the solution's first two coordinates, so a
//! grid archive over the search box observes where in space a solution
//! lives independently of how well it scores.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use qdex_testfunctions::sphere;
//!
//! let result = sphere(array![0.0, 0.0].view());
//! assert_eq!(result.objective, 0.0);
//! assert_eq!(result.measure.len(), 2);
//! ```

use ndarray::{Array1, ArrayView1};
use qdex_core::Evaluation;

/// Sphere function, negated so higher is better.
/// Global maximum: f(x) = 0 at x = (0, 0, ..., 0)
/// Measure: (x_0, x_1)
pub fn sphere(x: ArrayView1<'_, f64>) -> Evaluation {
    Evaluation {
        objective: -x.iter().map(|&xi| xi * xi).sum::<f64>(),
        measure: leading_pair(x),
    }
}

/// Rastrigin function, negated so higher is better.
/// Global maximum: f(x) = 0 at x = (0, 0, ..., 0)
/// Measure: (x_0, x_1)
pub fn rastrigin(x: ArrayView1<'_, f64>) -> Evaluation {
    let d = x.len() as f64;
    let sum: f64 = x
        .iter()
        .map(|&xi| xi * xi - 10.0 * (2.0 * std::f64::consts::PI * xi).cos())
        .sum();
    Evaluation {
        objective: -(10.0 * d + sum),
        measure: leading_pair(x),
    }
}

/// Coordinate sum objective with the full solution as measure.
/// Useful for coverage checks on a unit box: every point of the box is
/// its own behavior.
pub fn sum_of_coords(x: ArrayView1<'_, f64>) -> Evaluation {
    Evaluation {
        objective: x.sum(),
        measure: x.to_owned(),
    }
}

/// Negative L1 distance to the box center (0.5, ..., 0.5), with the
/// full solution as measure.
/// Global maximum: f(x) = 0 at x = (0.5, ..., 0.5)
pub fn neg_l1_distance(x: ArrayView1<'_, f64>) -> Evaluation {
    Evaluation {
        objective: -x.iter().map(|&xi| (xi - 0.5).abs()).sum::<f64>(),
        measure: x.to_owned(),
    }
}

fn leading_pair(x: ArrayView1<'_, f64>) -> Array1<f64> {
    Array1::from_vec(vec![x[0], x.get(1).copied().unwrap_or(0.0)])
}

/// Uniform `(lower, upper)` bounds for an `n`-dimensional box.
pub fn create_bounds(n: usize, lower: f64, upper: f64) -> Vec<(f64, f64)> {
    vec![(lower, upper); n]
}
