//! CMA-ES sampling and adaptation state
//!
//! Covariance Matrix Adaptation Evolution Strategy over a fixed
//! dimension: logarithmic recombination weights, cumulative evolution
//! paths, rank-one + rank-μ covariance update and step-size control.
//! This type only samples and adapts; archive interaction and ranking
//! live in [`CmaEsEmitter`](crate::CmaEsEmitter).

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

pub(crate) struct CmaEs {
    dim: usize,
    lambda: usize,
    mu: usize,
    /// Normalized log weights, length μ, Σw = 1.
    weights: Vec<f64>,
    mu_eff: f64,
    cc: f64,
    c1: f64,
    cmu: f64,
    csigma: f64,
    dsigma: f64,
    chi_n: f64,
    x0: DVector<f64>,
    sigma0: f64,
    mean: DVector<f64>,
    sigma: f64,
    cov: DMatrix<f64>,
    /// Eigenbasis B of C = B·diag(D²)·Bᵀ.
    eigenbasis: DMatrix<f64>,
    /// Axis scales D (square roots of the eigenvalues).
    scales: DVector<f64>,
    path_c: DVector<f64>,
    path_sigma: DVector<f64>,
    generation: usize,
}

impl CmaEs {
    pub(crate) fn new(x0: DVector<f64>, sigma0: f64) -> Self {
        let dim = x0.len();
        let d = dim as f64;
        let lambda = 4 + (3.0 * d.ln()).floor() as usize;
        let mu = lambda / 2;

        let mut weights: Vec<f64> = (1..=mu)
            .map(|i| ((lambda as f64 + 1.0) / 2.0).ln() - (i as f64).ln())
            .collect();
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let cc = 4.0 / (d + 4.0);
        let c1 = 2.0 / ((d + 1.3).powi(2) + mu_eff);
        let cmu = (1.0 - c1)
            .min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((d + 2.0).powi(2) + mu_eff));
        let csigma = (mu_eff + 2.0) / (d + mu_eff + 5.0);
        let dsigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (d + 1.0)).sqrt() - 1.0).max(0.0) + csigma;
        let chi_n = d.sqrt() * (1.0 - 1.0 / (4.0 * d) + 1.0 / (21.0 * d * d));

        Self {
            dim,
            lambda,
            mu,
            weights,
            mu_eff,
            cc,
            c1,
            cmu,
            csigma,
            dsigma,
            chi_n,
            mean: x0.clone(),
            x0,
            sigma0,
            sigma: sigma0,
            cov: DMatrix::identity(dim, dim),
            eigenbasis: DMatrix::identity(dim, dim),
            scales: DVector::from_element(dim, 1.0),
            path_c: DVector::zeros(dim),
            path_sigma: DVector::zeros(dim),
            generation: 0,
        }
    }

    pub(crate) fn mu(&self) -> usize {
        self.mu
    }

    pub(crate) fn lambda(&self) -> usize {
        self.lambda
    }

    pub(crate) fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn generation(&self) -> usize {
        self.generation
    }

    pub(crate) fn sigma(&self) -> f64 {
        self.sigma
    }

    pub(crate) fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Sample one candidate: `m + σ·B·(D ⊙ z)` with `z ~ N(0, I)`.
    pub(crate) fn ask_column(&self, rng: &mut StdRng) -> DVector<f64> {
        let z = DVector::from_fn(self.dim, |_, _| {
            let v: f64 = rng.sample(StandardNormal);
            v
        });
        &self.mean + (&self.eigenbasis * z.component_mul(&self.scales)) * self.sigma
    }

    /// One adaptation step from the selected parents, best first.
    ///
    /// `weights` must have the same length as `parents` and sum to 1
    /// (the caller renormalizes when fewer than μ parents survive
    /// selection).
    pub(crate) fn update(&mut self, parents: &[DVector<f64>], weights: &[f64]) {
        debug_assert_eq!(parents.len(), weights.len());
        if parents.is_empty() {
            return;
        }
        self.generation += 1;
        let m_old = self.mean.clone();

        let mut m_new = DVector::zeros(self.dim);
        for (weight, parent) in weights.iter().zip(parents) {
            m_new += parent * *weight;
        }
        let y = (&m_new - &m_old) / self.sigma;

        // C^{-1/2}·y through the eigendecomposition, pseudo-inverting
        // collapsed axes.
        let mut rotated = self.eigenbasis.transpose() * &y;
        for i in 0..self.dim {
            if self.scales[i] > 0.0 {
                rotated[i] /= self.scales[i];
            } else {
                rotated[i] = 0.0;
            }
        }
        let whitened = &self.eigenbasis * rotated;

        self.path_sigma = &self.path_sigma * (1.0 - self.csigma)
            + whitened * (self.csigma * (2.0 - self.csigma) * self.mu_eff).sqrt();
        let ps_norm = self.path_sigma.norm();

        let decay = 1.0 - (1.0 - self.csigma).powf(2.0 * self.generation as f64);
        let h_sigma =
            ps_norm / decay.sqrt() < (1.4 + 2.0 / (self.dim as f64 + 1.0)) * self.chi_n;
        let h = if h_sigma { 1.0 } else { 0.0 };

        self.path_c = &self.path_c * (1.0 - self.cc)
            + &y * (h * (self.cc * (2.0 - self.cc) * self.mu_eff).sqrt());

        let mut rank_mu = DMatrix::zeros(self.dim, self.dim);
        for (weight, parent) in weights.iter().zip(parents) {
            let deviation = (parent - &m_old) / self.sigma;
            rank_mu += (&deviation * deviation.transpose()) * *weight;
        }
        let discount = 1.0 - self.c1 - self.cmu + (1.0 - h) * self.c1;
        self.cov = &self.cov * discount
            + (&self.path_c * self.path_c.transpose()) * self.c1
            + rank_mu * self.cmu;

        self.sigma *= ((self.csigma / self.dsigma) * (ps_norm / self.chi_n - 1.0)).exp();
        self.mean = m_new;
        self.decompose();
    }

    /// Refresh B and D from C, clamping negative eigenvalues to 0.
    fn decompose(&mut self) {
        let symmetric = (&self.cov + self.cov.transpose()) * 0.5;
        self.cov = symmetric.clone();
        let eigen = symmetric.symmetric_eigen();
        self.scales = eigen.eigenvalues.map(|v| v.max(0.0).sqrt());
        self.eigenbasis = eigen.eigenvectors;
    }

    /// Reset to the initial distribution; the generation counter keeps
    /// running.
    pub(crate) fn restart(&mut self) {
        self.mean = self.x0.clone();
        self.sigma = self.sigma0;
        self.cov = DMatrix::identity(self.dim, self.dim);
        self.eigenbasis = DMatrix::identity(self.dim, self.dim);
        self.scales = DVector::from_element(self.dim, 1.0);
        self.path_c = DVector::zeros(self.dim);
        self.path_sigma = DVector::zeros(self.dim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_constants_for_dimension_ten() {
        let es = CmaEs::new(DVector::zeros(10), 0.5);
        // λ = 4 + ⌊3·ln 10⌋ = 10, μ = 5.
        assert_eq!(es.lambda(), 10);
        assert_eq!(es.mu(), 5);
        let sum: f64 = es.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        // Log weights decrease strictly.
        for pair in es.weights().windows(2) {
            assert!(pair[0] > pair[1]);
        }
        assert!(es.mu_eff > 1.0 && es.mu_eff < 5.0);
        let d = 10.0f64;
        assert!((es.chi_n - d.sqrt() * (1.0 - 1.0 / (4.0 * d) + 1.0 / (21.0 * d * d))).abs() < 1e-12);
    }

    #[test]
    fn test_ask_concentrates_on_mean_for_tiny_sigma() {
        let es = CmaEs::new(DVector::from_element(3, 2.0), 1e-12);
        let mut rng = StdRng::seed_from_u64(9);
        let column = es.ask_column(&mut rng);
        for i in 0..3 {
            assert!((column[i] - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_update_moves_mean_to_weighted_recombination() {
        let mut es = CmaEs::new(DVector::zeros(2), 0.5);
        let parents = vec![
            DVector::from_vec(vec![1.0, 0.0]),
            DVector::from_vec(vec![0.0, 1.0]),
        ];
        let weights = [0.75, 0.25];
        es.update(&parents, &weights);
        assert!((es.mean()[0] - 0.75).abs() < 1e-12);
        assert!((es.mean()[1] - 0.25).abs() < 1e-12);
        assert_eq!(es.generation(), 1);
        assert!(es.sigma() > 0.0 && es.sigma().is_finite());
    }

    #[test]
    fn test_stationary_parents_shrink_step_size() {
        let mut es = CmaEs::new(DVector::zeros(4), 0.3);
        let parents = vec![DVector::zeros(4)];
        let weights = [1.0];
        let before = es.sigma();
        es.update(&parents, &weights);
        assert!(es.sigma() < before);
    }

    #[test]
    fn test_restart_resets_distribution() {
        let mut es = CmaEs::new(DVector::from_element(2, 1.0), 0.5);
        let parents = vec![DVector::from_vec(vec![3.0, -1.0])];
        es.update(&parents, &[1.0]);
        assert_ne!(es.mean()[0], 1.0);
        es.restart();
        assert_eq!(es.mean()[0], 1.0);
        assert_eq!(es.sigma(), 0.5);
        assert_eq!(es.generation(), 1);
        assert_eq!(es.path_c.norm(), 0.0);
        assert_eq!(es.path_sigma.norm(), 0.0);
    }
}
