//! Round-robin scheduler
//!
//! Drives the ask → evaluate → tell loop over a list of emitters, one
//! emitter per batch in rotation. Evaluations may run in parallel;
//! ask/tell and every archive mutation stay on the calling thread, so
//! batches never overlap.

use std::sync::Arc;

use crate::archive::SharedArchive;
use crate::emitter::Emitter;
use crate::error::{QdError, Result};
use crate::objective::{ObjectiveFn, evaluate_batch, validate_objective};
use crate::stats::{ReportMode, StatsRecord, StatsReporter};

/// Action returned by a progress callback.
pub enum CallbackAction {
    Continue,
    /// Stop after the current batch; never interrupts a batch in flight.
    Stop,
}

/// Per-report callback; runs between batches on the calling thread.
pub type ProgressCallback = Box<dyn FnMut(&StatsRecord) -> CallbackAction + Send>;

/// Summary returned by a scheduler run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Batches executed by this call.
    pub batches: usize,
    /// Evaluations consumed by this call.
    pub evaluations: usize,
    /// Final archive statistics.
    pub stats: StatsRecord,
}

/// Distinct archives across emitters, by handle identity.
pub(crate) fn distinct_archives(emitters: &[Box<dyn Emitter>]) -> Vec<SharedArchive> {
    let mut archives: Vec<SharedArchive> = Vec::new();
    for emitter in emitters {
        let handle = emitter.archive();
        if !archives.iter().any(|known| Arc::ptr_eq(known, handle)) {
            archives.push(handle.clone());
        }
    }
    archives
}

/// Check the emitter list is nonempty and dimensionally consistent;
/// returns `(solution_dim, measure_dim)`.
pub(crate) fn validate_emitters(emitters: &[Box<dyn Emitter>]) -> Result<(usize, usize)> {
    let first = emitters
        .first()
        .ok_or_else(|| QdError::InvalidArgument("emitters must not be empty".into()))?;
    let dims = (first.solution_dim(), first.measure_dim());
    for (index, emitter) in emitters.iter().enumerate().skip(1) {
        if (emitter.solution_dim(), emitter.measure_dim()) != dims {
            return Err(QdError::InvalidArgument(format!(
                "emitter {index} has dims ({}, {}), expected ({}, {})",
                emitter.solution_dim(),
                emitter.measure_dim(),
                dims.0,
                dims.1
            )));
        }
    }
    Ok(dims)
}

/// Configuration for [`RoundRobinScheduler`].
pub struct RoundRobinSchedulerBuilder {
    emitters: Vec<Box<dyn Emitter>>,
    batch_size: Option<usize>,
    stats_frequency: usize,
    report_mode: ReportMode,
    report_archives: Option<Vec<SharedArchive>>,
    parallel: bool,
    show_progress: bool,
    callback: Option<ProgressCallback>,
}

impl RoundRobinSchedulerBuilder {
    pub fn new(emitters: Vec<Box<dyn Emitter>>) -> Self {
        Self {
            emitters,
            batch_size: None,
            stats_frequency: 1,
            report_mode: ReportMode::default(),
            report_archives: None,
            parallel: false,
            show_progress: true,
            callback: None,
        }
    }

    /// Candidates per batch; defaults to the host CPU count.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Emit a report every this many batches.
    pub fn stats_frequency(mut self, frequency: usize) -> Self {
        self.stats_frequency = frequency;
        self
    }

    pub fn report_mode(mut self, mode: ReportMode) -> Self {
        self.report_mode = mode;
        self
    }

    /// Archives aggregated into reports; defaults to the distinct
    /// archives referenced by the emitters.
    pub fn report_archives(mut self, archives: Vec<SharedArchive>) -> Self {
        self.report_archives = Some(archives);
        self
    }

    /// Evaluate batch columns on the rayon thread pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Called at every report boundary; may stop the run between
    /// batches.
    pub fn callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn build(self) -> Result<RoundRobinScheduler> {
        let (solution_dim, measure_dim) = validate_emitters(&self.emitters)?;
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
        Ok(RoundRobinScheduler {
            emitters: self.emitters,
            batch_size,
            stats_frequency: self.stats_frequency,
            reporter: StatsReporter::new(archives, self.report_mode),
            parallel: self.parallel,
            show_progress: self.show_progress,
            callback: self.callback,
            solution_dim,
            measure_dim,
            total_batches: 0,
            total_evaluations: 0,
        })
    }
}

/// Scheduler cycling through its emitters one batch at a time.
pub struct RoundRobinScheduler {
    emitters: Vec<Box<dyn Emitter>>,
    batch_size: usize,
    stats_frequency: usize,
    reporter: StatsReporter,
    parallel: bool,
    show_progress: bool,
    callback: Option<ProgressCallback>,
    solution_dim: usize,
    measure_dim: usize,
    total_batches: usize,
    total_evaluations: usize,
}

impl RoundRobinScheduler {
    pub fn builder(emitters: Vec<Box<dyn Emitter>>) -> RoundRobinSchedulerBuilder {
        RoundRobinSchedulerBuilder::new(emitters)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn report_archives(&self) -> &[SharedArchive] {
        self.reporter.archives()
    }

    /// Run until at least `n_evaluations` objective evaluations have
    /// been spent (whole batches; the last batch may overshoot).
    pub fn run<F: ObjectiveFn>(&mut self, objective: &F, n_evaluations: usize) -> Result<RunReport> {
        validate_objective(objective, self.solution_dim, self.measure_dim)?;
        let n_batches = n_evaluations.div_ceil(self.batch_size);
        let mut batches = 0;
        let mut evaluations = 0;

        for batch in 1..=n_batches {
            let index = (batch - 1) % self.emitters.len();
            let solutions = self.emitters[index].ask(self.batch_size);
            let (objectives, measures) =
                evaluate_batch(objective, &solutions, self.measure_dim, self.parallel)?;
            self.emitters[index].tell(&solutions, &objectives, &measures)?;

            batches += 1;
            evaluations += solutions.ncols();
            self.total_batches += 1;
            self.total_evaluations += solutions.ncols();

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

    /// Log a report and consult the callback; false means stop.
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
