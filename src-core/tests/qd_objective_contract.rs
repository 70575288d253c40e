use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{ArrayView1, array};
use qdex_core::{
    Bounds, Evaluation, GaussianEmitter, GridArchive, QdError, RoundRobinScheduler, SharedArchive,
    shared,
};

fn unit_archive() -> SharedArchive {
    shared(
        GridArchive::<f64>::builder(2)
            .cells_per_measure(&[10, 10])
            .measure_ranges(&[(0.0, 1.0), (0.0, 1.0)])
            .build()
            .unwrap(),
    )
}

fn scheduler(archive: SharedArchive) -> RoundRobinScheduler {
    let emitter = GaussianEmitter::builder(archive)
        .sigma(0.1)
        .x0(array![0.5, 0.5])
        .bounds(Bounds::Uniform(0.0, 1.0))
        .seed(1)
        .build()
        .unwrap();
    RoundRobinScheduler::builder(vec![Box::new(emitter)])
        .batch_size(10)
        .show_progress(false)
        .build()
        .unwrap()
}

#[test]
fn test_wrong_measure_shape_fails_before_any_evaluation() {
    let calls = AtomicUsize::new(0);
    // Returns a 1-dimensional measure against a 2-dimensional archive.
    let bad = |_: ArrayView1<'_, f64>| {
        calls.fetch_add(1, Ordering::SeqCst);
        Evaluation {
            objective: 0.0,
            measure: array![0.0],
        }
    };

    let result = scheduler(unit_archive()).run(&bad, 100);
    assert!(matches!(result, Err(QdError::InvalidObjective(_))));
    // Only the startup probe invoked the callback.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_matching_shape_passes_validation() {
    let good = |x: ArrayView1<'_, f64>| Evaluation {
        objective: x.sum(),
        measure: x.to_owned(),
    };
    let report = scheduler(unit_archive()).run(&good, 20).unwrap();
    assert_eq!(report.evaluations, 20);
}
