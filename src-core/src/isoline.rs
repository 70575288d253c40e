//! Iso+LineDD emitter (Vassiliades & Mouret)
//!
//! Mixes isotropic Gaussian noise with an anisotropic component along
//! the difference between two archive-sampled parents:
//! `x₁ + σ₁·z + σ₂·(x₂ − x₁)·u` with `z ~ N(0, I)` and `u ~ N(0, 1)`.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::archive::{Archive, SharedArchive};
use crate::bounds::{Bounds, clip_batch_inplace};
use crate::emitter::{Emitter, add_batch, tile_center, validate_batch_shapes};
use crate::error::{QdError, Result};
use crate::status::AddStatus;

/// Configuration for [`IsoLineEmitter`].
pub struct IsoLineEmitterBuilder {
    archive: SharedArchive,
    sigma_iso: f64,
    sigma_line: f64,
    x0: Option<Array1<f64>>,
    x0_scalar: f64,
    bounds: Bounds,
    seed: Option<u64>,
}

impl IsoLineEmitterBuilder {
    pub fn new(archive: SharedArchive) -> Self {
        Self {
            archive,
            sigma_iso: 0.01,
            sigma_line: 0.2,
            x0: None,
            x0_scalar: 0.0,
            bounds: Bounds::Unbounded,
            seed: None,
        }
    }

    /// Isotropic component σ₁.
    pub fn sigma_iso(mut self, sigma: f64) -> Self {
        self.sigma_iso = sigma;
        self
    }

    /// Directional component σ₂.
    pub fn sigma_line(mut self, sigma: f64) -> Self {
        self.sigma_line = sigma;
        self
    }

    pub fn x0(mut self, x0: Array1<f64>) -> Self {
        self.x0 = Some(x0);
        self
    }

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

    pub fn build(self) -> Result<IsoLineEmitter> {
        if !(self.sigma_iso > 0.0) || !(self.sigma_line >= 0.0) {
            return Err(QdError::InvalidArgument(
                "sigma_iso must be positive and sigma_line non-negative".into(),
            ));
        }
        let (solution_dim, measure_dim) = {
            let archive = self.archive.lock().unwrap();
            (archive.solution_dim(), archive.measure_dim())
        };
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
        Ok(IsoLineEmitter {
            archive: self.archive,
            sigma_iso: self.sigma_iso,
            sigma_line: self.sigma_line,
            x0,
            lower,
            upper,
            rng,
            solution_dim,
            measure_dim,
        })
    }
}

/// Emitter applying the Iso+LineDD variation operator.
pub struct IsoLineEmitter {
    archive: SharedArchive,
    sigma_iso: f64,
    sigma_line: f64,
    x0: Array1<f64>,
    lower: Array1<f64>,
    upper: Array1<f64>,
    rng: StdRng,
    solution_dim: usize,
    measure_dim: usize,
}

impl IsoLineEmitter {
    pub fn builder(archive: SharedArchive) -> IsoLineEmitterBuilder {
        IsoLineEmitterBuilder::new(archive)
    }
}

impl Emitter for IsoLineEmitter {
    fn ask(&mut self, n: usize) -> Array2<f64> {
        let (parents_a, parents_b) = {
            let archive = self.archive.lock().unwrap();
            let a = archive.sample(n, &mut self.rng);
            let b = archive.sample(n, &mut self.rng);
            match (a, b) {
                (Ok(a), Ok(b)) => (a, b),
                // Empty archive: both parents collapse onto x0.
                _ => (tile_center(&self.x0, n), tile_center(&self.x0, n)),
            }
        };
        let mut offspring = parents_a.clone();
        for j in 0..n {
            let u: f64 = self.rng.sample(StandardNormal);
            for i in 0..self.solution_dim {
                let z: f64 = self.rng.sample(StandardNormal);
                offspring[(i, j)] += self.sigma_iso * z
                    + self.sigma_line * (parents_b[(i, j)] - parents_a[(i, j)]) * u;
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
