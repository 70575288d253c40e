//! Objective callback contract and batch evaluation
//!
//! The engine treats the user objective as an opaque callable from a
//! solution vector to an [`Evaluation`]. Schedulers probe the callable
//! once at startup and evaluate whole batches either sequentially or as
//! a rayon data-parallel map over columns; workers receive only the
//! solution view, never emitter RNGs or archive state.

use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{QdError, Result};

/// What an objective function returns for one solution.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Scalar objective; higher is better.
    pub objective: f64,
    /// Behavioral descriptor of length `measure_dim`.
    pub measure: Array1<f64>,
}

/// User objective: solution vector in, objective + measure out.
///
/// The callable must be deterministic as a function of its input; any
/// side effects must be thread-safe since batches may be evaluated in
/// parallel.
pub trait ObjectiveFn: Sync {
    fn evaluate(&self, solution: ArrayView1<'_, f64>) -> Evaluation;
}

impl<F> ObjectiveFn for F
where
    F: Fn(ArrayView1<'_, f64>) -> Evaluation + Sync,
{
    fn evaluate(&self, solution: ArrayView1<'_, f64>) -> Evaluation {
        self(solution)
    }
}

/// Probe the callable on a zero vector and check the returned shape.
///
/// Runs once per `run` call, before any counted evaluation.
pub(crate) fn validate_objective<F: ObjectiveFn + ?Sized>(
    objective: &F,
    solution_dim: usize,
    measure_dim: usize,
) -> Result<()> {
    let probe = objective.evaluate(Array1::zeros(solution_dim).view());
    if probe.measure.len() != measure_dim {
        return Err(QdError::InvalidObjective(format!(
            "callback returned a measure of length {}, expected {}",
            probe.measure.len(),
            measure_dim
        )));
    }
    Ok(())
}

/// Evaluate every column of `solutions`, returning `(objectives,
/// measures)` with one measure column per candidate.
pub(crate) fn evaluate_batch<F: ObjectiveFn + ?Sized>(
    objective: &F,
    solutions: &Array2<f64>,
    measure_dim: usize,
    parallel: bool,
) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = solutions.ncols();
    let evaluations: Vec<Evaluation> = if parallel {
        solutions
            .axis_iter(Axis(1))
            .into_par_iter()
            .map(|column| objective.evaluate(column))
            .collect()
    } else {
        solutions
            .axis_iter(Axis(1))
            .map(|column| objective.evaluate(column))
            .collect()
    };

    let mut objectives = Array1::zeros(n);
    let mut measures = Array2::zeros((measure_dim, n));
    for (j, evaluation) in evaluations.into_iter().enumerate() {
        if evaluation.measure.len() != measure_dim {
            return Err(QdError::InvalidObjective(format!(
                "callback returned a measure of length {}, expected {}",
                evaluation.measure.len(),
                measure_dim
            )));
        }
        objectives[j] = evaluation.objective;
        measures.column_mut(j).assign(&evaluation.measure);
    }
    Ok((objectives, measures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear(solution: ArrayView1<'_, f64>) -> Evaluation {
        Evaluation {
            objective: solution.sum(),
            measure: solution.to_owned(),
        }
    }

    #[test]
    fn test_validation_accepts_matching_shape() {
        assert!(validate_objective(&linear, 2, 2).is_ok());
    }

    #[test]
    fn test_validation_rejects_shape_mismatch() {
        let bad = |_: ArrayView1<'_, f64>| Evaluation {
            objective: 0.0,
            measure: array![0.0],
        };
        assert!(matches!(
            validate_objective(&bad, 2, 2),
            Err(QdError::InvalidObjective(_))
        ));
    }

    #[test]
    fn test_batch_evaluation_matches_sequential() {
        let solutions = array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]];
        let (seq_obj, seq_meas) = evaluate_batch(&linear, &solutions, 2, false).unwrap();
        let (par_obj, par_meas) = evaluate_batch(&linear, &solutions, 2, true).unwrap();
        assert_eq!(seq_obj, array![3.0, 5.0, 7.0]);
        assert_eq!(seq_obj, par_obj);
        assert_eq!(seq_meas, par_meas);
        assert_eq!(seq_meas.column(1), array![1.0, 4.0].view());
    }
}
