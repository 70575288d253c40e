//! Gaussian emitter
//!
//! Draws parents from the archive (or the initial point while the
//! archive is empty) and perturbs them with axis-aligned Gaussian noise.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::archive::{Archive, SharedArchive};
use crate::bounds::{Bounds, clip_batch_inplace};
use crate::emitter::{Emitter, add_batch, tile_center, validate_batch_shapes};
use crate::error::{QdError, Result};
use crate::status::AddStatus;

#[derive(Debug, Clone)]
enum Sigma {
    Scalar(f64),
    PerDim(Array1<f64>),
}

/// Configuration for [`GaussianEmitter`].
pub struct GaussianEmitterBuilder {
    archive: SharedArchive,
    sigma: Sigma,
    x0: Option<Array1<f64>>,
    x0_scalar: f64,
    bounds: Bounds,
    seed: Option<u64>,
}

impl GaussianEmitterBuilder {
    pub fn new(archive: SharedArchive) -> Self {
        Self {
            archive,
            sigma: Sigma::Scalar(0.1),
            x0: None,
            x0_scalar: 0.0,
            bounds: Bounds::Unbounded,
            seed: None,
        }
    }

    /// One standard deviation broadcast across all dimensions.
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = Sigma::Scalar(sigma);
        self
    }

    /// Per-dimension standard deviations.
    pub fn sigma_per_dim(mut self, sigma: Array1<f64>) -> Self {
        self.sigma = Sigma::PerDim(sigma);
        self
    }

    /// Initial point used while the archive is empty.
    pub fn x0(mut self, x0: Array1<f64>) -> Self {
        self.x0 = Some(x0);
        self
    }

    /// Scalar initial point broadcast across all dimensions.
    pub fn x0_scalar(mut self, value: f64) -> Self {
        self.x0 = None;
        self.x0_scalar = value;
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<GaussianEmitter> {
        let (solution_dim, measure_dim) = {
            let archive = self.archive.lock().unwrap();
            (archive.solution_dim(), archive.measure_dim())
        };
        let sigma = match self.sigma {
            Sigma::Scalar(s) => Array1::from_elem(solution_dim, s),
            Sigma::PerDim(s) => {
                if s.len() != solution_dim {
                    return Err(QdError::DimensionMismatch {
                        what: "sigma",
                        expected: solution_dim,
                        actual: s.len(),
                    });
                }
                s
            }
        };
        if sigma.iter().any(|&s| !(s > 0.0)) {
            return Err(QdError::InvalidArgument(
                "sigma entries must be positive".into(),
            ));
        }
        let x0 = match self.x0 {
            Some(x0) => {
                if x0.len() != solution_dim {
                    return Err(QdError::DimensionMismatch {
                        what: "x0",
                        expected: solution_dim,
                        actual: x0.len(),
                    });
                }
                x0
            }
            None => Array1::from_elem(solution_dim, self.x0_scalar),
        };
        let (lower, upper) = self.bounds.resolve(solution_dim)?;
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => {
                let mut thread_rng = rand::rng();
                StdRng::from_rng(&mut thread_rng)
            }
        };
        Ok(GaussianEmitter {
            archive: self.archive,
            sigma,
            x0,
            lower,
            upper,
            rng,
            solution_dim,
            measure_dim,
        })
    }
}

/// Emitter adding axis-aligned Gaussian noise to archive-sampled parents.
pub struct GaussianEmitter {
    archive: SharedArchive,
    sigma: Array1<f64>,
    x0: Array1<f64>,
    lower: Array1<f64>,
    upper: Array1<f64>,
    rng: StdRng,
    solution_dim: usize,
    measure_dim: usize,
}

impl GaussianEmitter {
    pub fn builder(archive: SharedArchive) -> GaussianEmitterBuilder {
        GaussianEmitterBuilder::new(archive)
    }
}

impl Emitter for GaussianEmitter {
    fn ask(&mut self, n: usize) -> Array2<f64> {
        let mut offspring = {
            let archive = self.archive.lock().unwrap();
            match archive.sample(n, &mut self.rng) {
                Ok(parents) => parents,
                Err(_) => tile_center(&self.x0, n),
            }
        };
        for j in 0..n {
            for i in 0..self.solution_dim {
                let z: f64 = self.rng.sample(StandardNormal);
                offspring[(i, j)] += self.sigma[i] * z;
            }
        }
        clip_batch_inplace(&mut offspring, &self.lower, &self.upper);
        offspring
    }

    fn tell(
        &mut self,
        solutions: &Array2<f64>,
        objectives: &Array1<f64>,
        measures: &Array2<f64>,
    ) -> Result<Vec<AddStatus>> {
        validate_batch_shapes(
            self.solution_dim,
            self.measure_dim,
            solutions,
            objectives,
            measures,
        )?;
        add_batch(&self.archive, solutions, objectives, measures)
    }

    fn archive(&self) -> &SharedArchive {
        &self.archive
    }

    fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    fn measure_dim(&self) -> usize {
        self.measure_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::shared;
    use crate::grid_archive::GridArchive;
    use ndarray::array;

    fn unit_archive() -> SharedArchive {
        shared(
            GridArchive::<f64>::builder(2)
                .cells_per_measure(&[10, 10])
                .measure_ranges(&[(0.0, 1.0), (0.0, 1.0)])
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_ask_uses_x0_while_archive_empty() {
        let mut emitter = GaussianEmitter::builder(unit_archive())
            .sigma(1e-9)
            .x0(array![0.25, 0.75])
            .seed(1)
            .build()
            .unwrap();
        let batch = emitter.ask(4);
        assert_eq!(batch.dim(), (2, 4));
        for column in batch.columns() {
            assert!((column[0] - 0.25).abs() < 1e-6);
            assert!((column[1] - 0.75).abs() < 1e-6);
        }
    }

    #[test]
    fn test_ask_respects_bounds() {
        let mut emitter = GaussianEmitter::builder(unit_archive())
            .sigma(10.0)
            .x0(array![0.5, 0.5])
            .bounds(Bounds::Uniform(0.0, 1.0))
            .seed(2)
            .build()
            .unwrap();
        let batch = emitter.ask(64);
        for &v in batch.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_tell_routes_into_archive() {
        let archive = unit_archive();
        let mut emitter = GaussianEmitter::builder(archive.clone())
            .seed(3)
            .build()
            .unwrap();
        let solutions = array![[0.5, 0.7], [0.5, 0.7]];
        let objectives = array![1.0, 2.0];
        let measures = array![[0.3, 0.3], [0.3, 0.3]];
        let statuses = emitter.tell(&solutions, &objectives, &measures).unwrap();
        assert_eq!(statuses, vec![AddStatus::New(1.0), AddStatus::Improve(1.0)]);
        assert_eq!(archive.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_tell_rejects_mismatched_shapes() {
        let mut emitter = GaussianEmitter::builder(unit_archive())
            .seed(4)
            .build()
            .unwrap();
        let solutions = array![[0.5], [0.5]];
        let objectives = array![1.0, 2.0];
        let measures = array![[0.3], [0.3]];
        assert!(matches!(
            emitter.tell(&solutions, &objectives, &measures),
            Err(QdError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_seeded_ask_is_reproducible() {
        let make = || {
            GaussianEmitter::builder(unit_archive())
                .sigma(0.3)
                .x0(array![0.5, 0.5])
                .seed(42)
                .build()
                .unwrap()
        };
        let a = make().ask(8);
        let b = make().ask(8);
        assert_eq!(a, b);
    }
}
