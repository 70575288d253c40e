//! Bandit scheduler
//!
//! Treats each emitter as a bandit arm and allocates the evaluation
//! budget toward the arms producing the best objectives. Two selection
//! strategies are available behind [`BanditStrategy`]; UCB1 with
//! ζ = 0.05 is the default.

use ndarray::{Array2, ArrayView1, s};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::archive::SharedArchive;
use crate::emitter::Emitter;
use crate::error::{QdError, Result};
use crate::objective::{ObjectiveFn, evaluate_batch, validate_objective};
use crate::scheduler::{
    CallbackAction, ProgressCallback, RunReport, distinct_archives, validate_emitters,
};
use crate::stats::{ReportMode, StatsReporter};

/// Emitter-selection strategy for [`BanditScheduler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BanditStrategy {
    /// Upper confidence bound: `R/n + ζ·√(2·ln Σn / n)`, unpulled arms
    /// first.
    Ucb1 { zeta: f64 },
    /// Thompson sampling over per-batch mean rewards with Welford
    /// running statistics.
    Thompson,
}

impl Default for BanditStrategy {
    fn default() -> Self {
        BanditStrategy::Ucb1 { zeta: 0.05 }
    }
}

enum SelectionState {
    Ucb1 {
        zeta: f64,
        pulls: Vec<usize>,
        rewards: Vec<f64>,
    },
    Thompson {
        counts: Vec<usize>,
        means: Vec<f64>,
        m2: Vec<f64>,
    },
}

impl SelectionState {
    fn new(strategy: BanditStrategy, arms: usize) -> Self {
        match strategy {
            BanditStrategy::Ucb1 { zeta } => SelectionState::Ucb1 {
                zeta,
                pulls: vec![0; arms],
                rewards: vec![0.0; arms],
            },
            BanditStrategy::Thompson => SelectionState::Thompson {
                counts: vec![0; arms],
                means: vec![0.0; arms],
                m2: vec![0.0; arms],
            },
        }
    }

    /// Pick `num_active` arm indices for the next batch.
    fn choose(&self, num_active: usize, rng: &mut StdRng) -> Vec<usize> {
        match self {
            SelectionState::Ucb1 { zeta, pulls, rewards } => {
                let mut unused: Vec<usize> =
                    (0..pulls.len()).filter(|&i| pulls[i] == 0).collect();
                if !unused.is_empty() {
                    unused.shuffle(rng);
                    unused.truncate(num_active);
                    return unused;
                }
                let total: f64 = pulls.iter().map(|&n| n as f64).sum();
                let scores: Vec<f64> = (0..pulls.len())
                    .map(|i| {
                        let n = pulls[i] as f64;
                        rewards[i] / n + zeta * (2.0 * total.ln() / n).sqrt()
                    })
                    .collect();
                top_indices(&scores, num_active)
            }
            SelectionState::Thompson { counts, means, m2 } => {
                let scores: Vec<f64> = (0..counts.len())
                    .map(|i| {
                        let variance = if counts[i] > 1 {
                            m2[i] / (counts[i] as f64 - 1.0)
                        } else {
                            1.0
                        };
                        let epsilon: f64 = rng.sample(StandardNormal);
                        means[i] + epsilon * variance.sqrt()
                    })
                    .collect();
                top_indices(&scores, num_active)
            }
        }
    }

    /// Feed one arm's slice of evaluated objectives back in.
    fn update(&mut self, arm: usize, objectives: ArrayView1<'_, f64>) {
        if objectives.is_empty() {
            return;
        }
        match self {
            SelectionState::Ucb1 { pulls, rewards, .. } => {
                rewards[arm] += objectives.sum();
                pulls[arm] += objectives.len();
            }
            SelectionState::Thompson { counts, means, m2 } => {
                let reward = objectives.sum() / objectives.len() as f64;
                counts[arm] += 1;
                let delta = reward - means[arm];
                means[arm] += delta / counts[arm] as f64;
                m2[arm] += delta * (reward - means[arm]);
            }
        }
    }
}

/// Indices of the `k` largest scores, best first.
fn top_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(k);
    order
}

/// Configuration for [`BanditScheduler`].
pub struct BanditSchedulerBuilder {
    emitters: Vec<Box<dyn Emitter>>,
    num_active: usize,
    strategy: BanditStrategy,
    batch_size: Option<usize>,
    stats_frequency: usize,
    report_mode: ReportMode,
    report_archives: Option<Vec<SharedArchive>>,
    parallel: bool,
    show_progress: bool,
    callback: Option<ProgressCallback>,
    seed: Option<u64>,
}

impl BanditSchedulerBuilder {
    pub fn new(emitters: Vec<Box<dyn Emitter>>) -> Self {
        Self {
            emitters,
            num_active: 1,
            strategy: BanditStrategy::default(),
            batch_size: None,
            stats_frequency: 1,
            report_mode: ReportMode::default(),
            report_archives: None,
            parallel: false,
            show_progress: true,
            callback: None,
            seed: None,
        }
    }

    /// Emitters active per batch.
    pub fn num_active(mut self, num_active: usize) -> Self {
        self.num_active = num_active;
        self
    }

    pub fn strategy(mut self, strategy: BanditStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn stats_frequency(mut self, frequency: usize) -> Self {
        self.stats_frequency = frequency;
        self
    }

    pub fn report_mode(mut self, mode: ReportMode) -> Self {
        self.report_mode = mode;
        self
    }

    pub fn report_archives(mut self, archives: Vec<SharedArchive>) -> Self {
        self.report_archives = Some(archives);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Seed for the selection RNG (tie shuffles, Thompson draws).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<BanditScheduler> {
        let (solution_dim, measure_dim) = validate_emitters(&self.emitters)?;
        if self.num_active == 0 || self.num_active > self.emitters.len() {
            return Err(QdError::InvalidArgument(format!(
                "num_active must be in 1..={}, got {}",
                self.emitters.len(),
                self.num_active
            )));
        }
        if let BanditStrategy::Ucb1 { zeta } = self.strategy {
            if !(zeta >= 0.0) {
                return Err(QdError::InvalidArgument(format!(
                    "zeta must be non-negative, got {zeta}"
                )));
            }
        }
        let batch_size = self.batch_size.unwrap_or_else(num_cpus::get);
        if batch_size == 0 {
            return Err(QdError::InvalidArgument(
                "batch_size must be positive".into(),
            ));
        }
        if self.stats_frequency == 0 {
            return Err(QdError::InvalidArgument(
                "stats_frequency must be positive".into(),
            ));
        }
        let archives = self
            .report_archives
            .unwrap_or_else(|| distinct_archives(&self.emitters));
        let selection = SelectionState::new(self.strategy, self.emitters.len());
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => {
                let mut thread_rng = rand::rng();
                StdRng::from_rng(&mut thread_rng)
            }
        };
        Ok(BanditScheduler {
            emitters: self.emitters,
            num_active: self.num_active,
            selection,
            batch_size,
            stats_frequency: self.stats_frequency,
            reporter: StatsReporter::new(archives, self.report_mode),
            parallel: self.parallel,
            show_progress: self.show_progress,
            callback: self.callback,
            rng,
            solution_dim,
            measure_dim,
            total_batches: 0,
            total_evaluations: 0,
        })
    }
}

/// Scheduler allocating batches across emitters with a bandit rule.
pub struct BanditScheduler {
    emitters: Vec<Box<dyn Emitter>>,
    num_active: usize,
    selection: SelectionState,
    batch_size: usize,
    stats_frequency: usize,
    reporter: StatsReporter,
    parallel: bool,
    show_progress: bool,
    callback: Option<ProgressCallback>,
    rng: StdRng,
    solution_dim: usize,
    measure_dim: usize,
    total_batches: usize,
    total_evaluations: usize,
}

impl BanditScheduler {
    pub fn builder(emitters: Vec<Box<dyn Emitter>>) -> BanditSchedulerBuilder {
        BanditSchedulerBuilder::new(emitters)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn report_archives(&self) -> &[SharedArchive] {
        self.reporter.archives()
    }

    /// Run until at least `n_evaluations` objective evaluations have
    /// been spent.
    pub fn run<F: ObjectiveFn>(&mut self, objective: &F, n_evaluations: usize) -> Result<RunReport> {
        validate_objective(objective, self.solution_dim, self.measure_dim)?;
        let n_batches = n_evaluations.div_ceil(self.batch_size);
        let mut batches = 0;
        let mut evaluations = 0;

        for batch in 1..=n_batches {
            let chosen = self.selection.choose(self.num_active, &mut self.rng);
            // The quota divides by the configured num_active even when
            // fewer arms were chosen (a first UCB1 round can run out of
            // unused arms); shares truncate so the batch never exceeds
            // batch_size.
            let quota = self.batch_size.div_ceil(self.num_active);

            let mut slices: Vec<(usize, usize, usize)> = Vec::with_capacity(chosen.len());
            let mut asked: Vec<Array2<f64>> = Vec::with_capacity(chosen.len());
            let mut remaining = self.batch_size;
            for &arm in &chosen {
                let count = quota.min(remaining);
                if count == 0 {
                    break;
                }
                slices.push((arm, self.batch_size - remaining, count));
                asked.push(self.emitters[arm].ask(count));
                remaining -= count;
            }
            let total: usize = slices.iter().map(|&(_, _, count)| count).sum();

            let mut solutions = Array2::zeros((self.solution_dim, total));
            for (&(_, start, count), block) in slices.iter().zip(&asked) {
                solutions
                    .slice_mut(s![.., start..start + count])
                    .assign(block);
            }

            let (objectives, measures) =
                evaluate_batch(objective, &solutions, self.measure_dim, self.parallel)?;

            for &(arm, start, count) in &slices {
                self.emitters[arm].tell(
                    &solutions.slice(s![.., start..start + count]).to_owned(),
                    &objectives.slice(s![start..start + count]).to_owned(),
                    &measures.slice(s![.., start..start + count]).to_owned(),
                )?;
                self.selection
                    .update(arm, objectives.slice(s![start..start + count]));
            }

            batches += 1;
            evaluations += total;
            self.total_batches += 1;
            self.total_evaluations += total;

            if batch % self.stats_frequency == 0 && !self.emit_report() {
                break;
            }
        }

        Ok(RunReport {
            batches,
            evaluations,
            stats: self.reporter.report(self.total_batches, self.total_evaluations),
        })
    }

    fn emit_report(&mut self) -> bool {
        if !self.show_progress && self.callback.is_none() {
            return true;
        }
        let record = self.reporter.report(self.total_batches, self.total_evaluations);
        if self.show_progress {
            self.reporter.log(&record);
        }
        if let Some(callback) = self.callback.as_mut() {
            if matches!(callback(&record), CallbackAction::Stop) {
                return false;
            }
        }
        true
    }
}
