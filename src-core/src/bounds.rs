//! Box constraints for emitter search spaces

use ndarray::{Array1, Array2};

use crate::error::{QdError, Result};

/// Search-space bounds accepted by emitter builders.
///
/// `Unbounded` resolves to ±∞ on every axis, `Uniform` broadcasts one
/// pair across all dimensions, and `PerDim` gives an explicit pair per
/// dimension.
#[derive(Debug, Clone, Default)]
pub enum Bounds {
    #[default]
    Unbounded,
    Uniform(f64, f64),
    PerDim(Vec<(f64, f64)>),
}

impl Bounds {
    /// Resolve into `(lower, upper)` vectors of length `dim`.
    pub fn resolve(&self, dim: usize) -> Result<(Array1<f64>, Array1<f64>)> {
        match self {
            Bounds::Unbounded => Ok((
                Array1::from_elem(dim, f64::NEG_INFINITY),
                Array1::from_elem(dim, f64::INFINITY),
            )),
            Bounds::Uniform(lo, hi) => {
                if lo > hi {
                    return Err(QdError::InvalidArgument(format!(
                        "inverted bounds: lower {lo} > upper {hi}"
                    )));
                }
                Ok((Array1::from_elem(dim, *lo), Array1::from_elem(dim, *hi)))
            }
            Bounds::PerDim(pairs) => {
                if pairs.len() != dim {
                    return Err(QdError::DimensionMismatch {
                        what: "bounds",
                        expected: dim,
                        actual: pairs.len(),
                    });
                }
                for (i, (lo, hi)) in pairs.iter().enumerate() {
                    if lo > hi {
                        return Err(QdError::InvalidArgument(format!(
                            "inverted bounds at dimension {i}: lower {lo} > upper {hi}"
                        )));
                    }
                }
                let lower = Array1::from_iter(pairs.iter().map(|&(lo, _)| lo));
                let upper = Array1::from_iter(pairs.iter().map(|&(_, hi)| hi));
                Ok((lower, upper))
            }
        }
    }
}

/// Clamp every column of `batch` componentwise into `[lower, upper]`.
pub(crate) fn clip_batch_inplace(batch: &mut Array2<f64>, lower: &Array1<f64>, upper: &Array1<f64>) {
    for mut column in batch.columns_mut() {
        for i in 0..column.len() {
            if column[i] < lower[i] {
                column[i] = lower[i];
            }
            if column[i] > upper[i] {
                column[i] = upper[i];
            }
        }
    }
}
