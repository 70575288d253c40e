//! Quality-Diversity optimization engine in pure Rust using ndarray
//!
//! A QD engine searches for a collection of high-performing,
//! behaviorally diverse solutions rather than a single optimum. The
//! user objective maps a solution vector to a scalar objective plus a
//! low-dimensional measure vector; the engine maintains an archive
//! partitioned over measure space, generates candidates through
//! emitters and orchestrates batched evaluation through a scheduler.
//!
//! Supported features:
//! - Grid archive with threshold-based replacement (EMA learning rate,
//!   threshold floor) and best-ever elite tracking
//! - Pareto archive over `(objective, measure…)`
//! - Gaussian, Iso+LineDD and CMA-ES emitters with archive-sampled
//!   parents, box constraints and per-emitter seeded RNGs
//! - Round-robin and multi-armed-bandit (UCB1 / Thompson) schedulers
//! - Sequential or rayon-parallel objective evaluation
//! - Per-batch JSON stats reports through the `log` facade
//!
//! ```no_run
//! use ndarray::{ArrayView1, array};
//! use qdex_core::{
//!     Bounds, Evaluation, GaussianEmitter, GridArchive, RoundRobinScheduler, shared,
//! };
//!
//! let archive = shared(
//!     GridArchive::<f64>::builder(2)
//!         .cells_per_measure(&[20, 20])
//!         .measure_ranges(&[(0.0, 1.0), (0.0, 1.0)])
//!         .build()?,
//! );
//! let emitter = GaussianEmitter::builder(archive.clone())
//!     .sigma(0.1)
//!     .x0(array![0.5, 0.5])
//!     .bounds(Bounds::Uniform(0.0, 1.0))
//!     .seed(42)
//!     .build()?;
//! let mut scheduler = RoundRobinScheduler::builder(vec![Box::new(emitter)])
//!     .batch_size(32)
//!     .build()?;
//! let objective = |x: ArrayView1<'_, f64>| Evaluation {
//!     objective: x.sum(),
//!     measure: x.to_owned(),
//! };
//! let report = scheduler.run(&objective, 10_000)?;
//! println!("coverage: {}", report.stats.coverage);
//! # Ok::<(), qdex_core::QdError>(())
//! ```

pub mod archive;
pub mod bandit;
pub mod bounds;
mod cmaes;
pub mod cmaes_emitter;
pub mod elite;
pub mod emitter;
pub mod error;
pub mod gaussian;
pub mod grid_archive;
pub mod isoline;
pub mod objective;
pub mod pareto_archive;
pub mod ranking;
pub mod scheduler;
pub mod stats;
pub mod status;

pub use archive::{Archive, SharedArchive, shared};
pub use bandit::{BanditScheduler, BanditSchedulerBuilder, BanditStrategy};
pub use bounds::Bounds;
pub use cmaes_emitter::{CmaEsEmitter, CmaEsEmitterBuilder};
pub use elite::Elite;
pub use emitter::Emitter;
pub use error::{QdError, Result};
pub use gaussian::{GaussianEmitter, GaussianEmitterBuilder};
pub use grid_archive::{GridArchive, GridArchiveBuilder, Scalar};
pub use isoline::{IsoLineEmitter, IsoLineEmitterBuilder};
pub use objective::{Evaluation, ObjectiveFn};
pub use pareto_archive::ParetoArchive;
pub use ranking::{Ranking, Selection};
pub use scheduler::{
    CallbackAction, ProgressCallback, RoundRobinScheduler, RoundRobinSchedulerBuilder, RunReport,
};
pub use stats::{ReportMode, StatsRecord, StatsReporter};
pub use status::AddStatus;
