//! CMA-ES emitter
//!
//! Wraps the [`CmaEs`] strategy state with archive-aware candidate
//! ranking, parent selection and a no-improvement restart rule.

use std::cmp::Ordering;

use log::debug;
use nalgebra::DVector;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::archive::{Archive, SharedArchive};
use crate::bounds::{Bounds, clip_batch_inplace};
use crate::cmaes::CmaEs;
use crate::emitter::{Emitter, add_batch, validate_batch_shapes};
use crate::error::{QdError, Result};
use crate::ranking::{Ranking, Selection};
use crate::status::AddStatus;

/// Configuration for [`CmaEsEmitter`].
pub struct CmaEsEmitterBuilder {
    archive: SharedArchive,
    sigma0: f64,
    x0: Option<Array1<f64>>,
    x0_scalar: f64,
    ranking: Ranking,
    selection: Selection,
    restart_after: usize,
    bounds: Bounds,
    seed: Option<u64>,
}

impl CmaEsEmitterBuilder {
    pub fn new(archive: SharedArchive) -> Self {
        Self {
            archive,
            sigma0: 0.5,
            x0: None,
            x0_scalar: 0.0,
            ranking: Ranking::default(),
            selection: Selection::default(),
            restart_after: 10,
            bounds: Bounds::Unbounded,
            seed: None,
        }
    }

    /// Initial step size σ₀.
    pub fn sigma0(mut self, sigma0: f64) -> Self {
        self.sigma0 = sigma0;
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

    pub fn ranking(mut self, ranking: Ranking) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Generations without an archive insertion before the strategy
    /// restarts from x0.
    pub fn restart_after(mut self, generations: usize) -> Self {
        self.restart_after = generations;
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

    pub fn build(self) -> Result<CmaEsEmitter> {
        if !(self.sigma0 > 0.0) {
            return Err(QdError::InvalidArgument(format!(
                "sigma0 must be positive, got {}",
                self.sigma0
            )));
        }
        if self.restart_after == 0 {
            return Err(QdError::InvalidArgument(
                "restart_after must be at least 1".into(),
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
        let es = CmaEs::new(DVector::from_iterator(solution_dim, x0.iter().copied()), self.sigma0);
        Ok(CmaEsEmitter {
            archive: self.archive,
            es,
            ranking: self.ranking,
            selection: self.selection,
            restart_after: self.restart_after,
            last_improvement: 0,
            direction: None,
            lower,
            upper,
            rng,
            solution_dim,
            measure_dim,
        })
    }
}

/// Emitter sampling from an adaptive Gaussian driven by CMA-ES.
pub struct CmaEsEmitter {
    archive: SharedArchive,
    es: CmaEs,
    ranking: Ranking,
    selection: Selection,
    restart_after: usize,
    last_improvement: usize,
    /// Fixed random unit direction in measure space, drawn lazily for
    /// the direction-based rankings and dropped on restart.
    direction: Option<Array1<f64>>,
    lower: Array1<f64>,
    upper: Array1<f64>,
    rng: StdRng,
    solution_dim: usize,
    measure_dim: usize,
}

impl CmaEsEmitter {
    pub fn builder(archive: SharedArchive) -> CmaEsEmitterBuilder {
        CmaEsEmitterBuilder::new(archive)
    }

    /// Natural CMA-ES batch size λ for this dimension.
    pub fn natural_batch_size(&self) -> usize {
        self.es.lambda()
    }

    fn direction(&mut self) -> &Array1<f64> {
        let rng = &mut self.rng;
        let measure_dim = self.measure_dim;
        self.direction.get_or_insert_with(|| loop {
            let z = Array1::from_shape_fn(measure_dim, |_| {
                let v: f64 = rng.sample(StandardNormal);
                v
            });
            let norm = z.dot(&z).sqrt();
            if norm > 0.0 {
                break z / norm;
            }
        })
    }

    /// Descending candidate ordering under the configured policy.
    fn rank(
        &mut self,
        objectives: &Array1<f64>,
        measures: &Array2<f64>,
        statuses: Option<&[AddStatus]>,
    ) -> Vec<usize> {
        let n = objectives.len();
        let projections: Option<Vec<f64>> = if self.ranking.needs_direction() {
            let direction = self.direction().clone();
            Some((0..n).map(|j| measures.column(j).dot(&direction)).collect())
        } else {
            None
        };

        let key = |j: usize| -> (u8, f64) {
            let added = statuses.map_or(1, |s| u8::from(s[j].was_added()));
            match self.ranking {
                Ranking::Objective => (1, objectives[j]),
                Ranking::TwoStageObjective => (added, objectives[j]),
                Ranking::Improvement | Ranking::TwoStageImprovement => {
                    let value = statuses.expect("ranking requires add results")[j].value();
                    if self.ranking == Ranking::Improvement {
                        (1, value)
                    } else {
                        (added, value)
                    }
                }
                Ranking::RandomDirection | Ranking::TwoStageRandomDirection => {
                    let projection = projections.as_ref().expect("projections computed")[j];
                    if self.ranking == Ranking::RandomDirection {
                        (1, projection)
                    } else {
                        (added, projection)
                    }
                }
            }
        };

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let (stage_a, value_a) = key(a);
            let (stage_b, value_b) = key(b);
            stage_b
                .cmp(&stage_a)
                .then_with(|| value_b.partial_cmp(&value_a).unwrap_or(Ordering::Equal))
        });
        order
    }

    /// Pick parents from the ranked candidates.
    fn select_parents(&self, order: &[usize], solutions: &Array2<f64>) -> Vec<usize> {
        let mu = self.es.mu().min(order.len());
        match self.selection {
            Selection::Mu => order[..mu].to_vec(),
            Selection::Filter => {
                let mut kept: Vec<usize> = Vec::new();
                for &candidate in order {
                    let dominated = kept.iter().any(|&keeper| {
                        (0..self.solution_dim)
                            .all(|i| solutions[(i, keeper)] >= solutions[(i, candidate)])
                    });
                    if !dominated {
                        kept.push(candidate);
                        if kept.len() == mu {
                            break;
                        }
                    }
                }
                kept
            }
        }
    }
}

impl Emitter for CmaEsEmitter {
    fn ask(&mut self, n: usize) -> Array2<f64> {
        let mut batch = Array2::zeros((self.solution_dim, n));
        for j in 0..n {
            let column = self.es.ask_column(&mut self.rng);
            for i in 0..self.solution_dim {
                batch[(i, j)] = column[i];
            }
        }
        clip_batch_inplace(&mut batch, &self.lower, &self.upper);
        batch
    }

    fn tell(
        &mut self,
        solutions: &Array2<f64>,
        objectives: &Array1<f64>,
        measures: &Array2<f64>,
    ) -> Result<Vec<AddStatus>> {
        let n = validate_batch_shapes(
            self.solution_dim,
            self.measure_dim,
            solutions,
            objectives,
            measures,
        )?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let ranked_statuses = if self.ranking.adds_during_ranking() {
            Some(add_batch(&self.archive, solutions, objectives, measures)?)
        } else {
            None
        };

        let order = self.rank(objectives, measures, ranked_statuses.as_deref());
        let parent_indices = self.select_parents(&order, solutions);

        let parents: Vec<DVector<f64>> = parent_indices
            .iter()
            .map(|&j| DVector::from_iterator(self.solution_dim, solutions.column(j).iter().copied()))
            .collect();
        let mut weights: Vec<f64> = self.es.weights()[..parents.len()].to_vec();
        let total: f64 = weights.iter().sum();
        for weight in &mut weights {
            *weight /= total;
        }
        self.es.update(&parents, &weights);

        // Policies that did not insert during ranking populate the
        // archive here; either way these statuses drive the restart rule.
        let statuses = match ranked_statuses {
            Some(statuses) => statuses,
            None => add_batch(&self.archive, solutions, objectives, measures)?,
        };

        let generation = self.es.generation();
        if statuses.iter().any(AddStatus::was_added) {
            self.last_improvement = generation;
        } else if generation - self.last_improvement >= self.restart_after {
            debug!(
                "cma-es restart at generation {generation} after {} stale generations (sigma was {:.3e})",
                generation - self.last_improvement,
                self.es.sigma()
            );
            self.es.restart();
            self.direction = None;
            self.last_improvement = generation;
        }
        Ok(statuses)
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

    fn emitter(ranking: Ranking, selection: Selection) -> CmaEsEmitter {
        CmaEsEmitter::builder(unit_archive())
            .sigma0(0.2)
            .x0(array![0.5, 0.5])
            .ranking(ranking)
            .selection(selection)
            .seed(13)
            .build()
            .unwrap()
    }

    #[test]
    fn test_ask_respects_bounds() {
        let mut emitter = CmaEsEmitter::builder(unit_archive())
            .sigma0(5.0)
            .x0(array![0.5, 0.5])
            .bounds(Bounds::Uniform(0.0, 1.0))
            .seed(21)
            .build()
            .unwrap();
        let batch = emitter.ask(32);
        for &v in batch.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_tell_inserts_for_improvement_ranking() {
        let mut emitter = emitter(Ranking::TwoStageImprovement, Selection::Mu);
        let solutions = emitter.ask(4);
        let objectives = array![1.0, 2.0, 3.0, 4.0];
        let measures = array![[0.1, 0.3, 0.5, 0.7], [0.1, 0.3, 0.5, 0.7]];
        let statuses = emitter.tell(&solutions, &objectives, &measures).unwrap();
        assert_eq!(statuses.len(), 4);
        assert!(statuses.iter().all(AddStatus::was_added));
        assert_eq!(emitter.archive().lock().unwrap().len(), 4);
    }

    #[test]
    fn test_tell_inserts_for_plain_objective_ranking() {
        // The plain policies insert in the post-update sweep.
        let mut emitter = emitter(Ranking::Objective, Selection::Mu);
        let solutions = emitter.ask(3);
        let objectives = array![1.0, 2.0, 3.0];
        let measures = array![[0.1, 0.5, 0.9], [0.1, 0.5, 0.9]];
        emitter.tell(&solutions, &objectives, &measures).unwrap();
        assert_eq!(emitter.archive().lock().unwrap().len(), 3);
    }

    #[test]
    fn test_ranking_orders_by_objective_descending() {
        let mut emitter = emitter(Ranking::Objective, Selection::Mu);
        let objectives = array![1.0, 5.0, 3.0];
        let measures = array![[0.1, 0.5, 0.9], [0.1, 0.5, 0.9]];
        let order = emitter.rank(&objectives, &measures, None);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_two_stage_ranking_puts_added_first() {
        let mut emitter = emitter(Ranking::TwoStageObjective, Selection::Mu);
        let objectives = array![9.0, 1.0, 5.0];
        let measures = array![[0.1, 0.5, 0.9], [0.1, 0.5, 0.9]];
        let statuses = [
            AddStatus::NotAdded(-1.0),
            AddStatus::New(1.0),
            AddStatus::Improve(2.0),
        ];
        let order = emitter.rank(&objectives, &measures, Some(&statuses));
        // Added candidates lead despite lower objectives.
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn test_filter_selection_drops_dominated_solutions() {
        let emitter = emitter(Ranking::Objective, Selection::Filter);
        // Column 0 dominates column 1 componentwise; column 2 is
        // incomparable with column 0.
        let solutions = array![[2.0, 1.0, 0.0], [2.0, 1.0, 3.0]];
        let order = vec![0, 1, 2];
        let parents = emitter.select_parents(&order, &solutions);
        assert_eq!(parents, vec![0, 2]);
    }

    #[test]
    fn test_filter_keeps_earlier_on_equal_solutions() {
        let emitter = emitter(Ranking::Objective, Selection::Filter);
        let solutions = array![[1.0, 1.0], [2.0, 2.0]];
        let parents = emitter.select_parents(&[0, 1], &solutions);
        assert_eq!(parents, vec![0]);
    }

    #[test]
    fn test_restart_after_stale_generations() {
        let archive = unit_archive();
        // Occupy the only reachable cell with an unbeatable objective so
        // every subsequent tell is rejected.
        archive
            .lock()
            .unwrap()
            .add(array![0.5, 0.5].view(), 1e9, array![0.05, 0.05].view())
            .unwrap();
        let mut emitter = CmaEsEmitter::builder(archive)
            .sigma0(0.1)
            .x0(array![0.5, 0.5])
            .ranking(Ranking::TwoStageImprovement)
            .restart_after(3)
            .seed(17)
            .build()
            .unwrap();

        let measures = array![[0.05], [0.05]];
        for _ in 0..3 {
            let solutions = emitter.ask(1);
            let objectives = array![0.0];
            let statuses = emitter.tell(&solutions, &objectives, &measures).unwrap();
            assert!(!statuses[0].was_added());
        }
        // Three stale generations tripped the restart back to x0.
        assert_eq!(emitter.es.mean()[0], 0.5);
        assert_eq!(emitter.es.mean()[1], 0.5);
        assert_eq!(emitter.es.sigma(), 0.1);
        assert_eq!(emitter.last_improvement, 3);
    }
}
