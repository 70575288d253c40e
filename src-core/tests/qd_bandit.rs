use ndarray::array;
use qdex_core::{
    Archive, BanditScheduler, BanditStrategy, Bounds, Emitter, GaussianEmitter, SharedArchive,
    shared,
};
use qdex_core::GridArchive;
use qdex_testfunctions::neg_l1_distance;

fn unit_archive() -> SharedArchive {
    shared(
        GridArchive::<f64>::builder(2)
            .cells_per_measure(&[10, 10])
            .measure_ranges(&[(0.0, 1.0), (0.0, 1.0)])
            .build()
            .unwrap(),
    )
}

fn emitter_pair(archive: &SharedArchive) -> Vec<Box<dyn Emitter>> {
    let narrow = GaussianEmitter::builder(archive.clone())
        .sigma_per_dim(array![0.1, 0.1])
        .x0(array![0.5, 0.5])
        .bounds(Bounds::Uniform(0.0, 1.0))
        .seed(101)
        .build()
        .unwrap();
    let wide = GaussianEmitter::builder(archive.clone())
        .sigma_per_dim(array![0.2, 0.2])
        .x0(array![0.5, 0.5])
        .bounds(Bounds::Uniform(0.0, 1.0))
        .seed(102)
        .build()
        .unwrap();
    vec![Box::new(narrow), Box::new(wide)]
}

#[test]
fn test_ucb_bandit_populates_archive() {
    let archive = unit_archive();
    let mut scheduler = BanditScheduler::builder(emitter_pair(&archive))
        .num_active(1)
        .batch_size(10)
        .show_progress(false)
        .seed(103)
        .build()
        .unwrap();
    let report = scheduler.run(&neg_l1_distance, 100).unwrap();

    assert_eq!(report.evaluations, 100);
    let archive = archive.lock().unwrap();
    assert!(!archive.is_empty());
    assert!(archive.coverage() > 0.0);
    // The optimum sits at the center of the box.
    assert!(archive.obj_max().unwrap() <= 0.0);
}

#[test]
fn test_thompson_bandit_populates_archive() {
    let archive = unit_archive();
    let mut scheduler = BanditScheduler::builder(emitter_pair(&archive))
        .strategy(BanditStrategy::Thompson)
        .num_active(2)
        .batch_size(10)
        .show_progress(false)
        .seed(104)
        .build()
        .unwrap();
    let report = scheduler.run(&neg_l1_distance, 100).unwrap();

    assert_eq!(report.evaluations, 100);
    assert!(archive.lock().unwrap().coverage() > 0.0);
}

#[test]
fn test_identically_seeded_bandits_agree() {
    let run = || {
        let archive = unit_archive();
        let mut scheduler = BanditScheduler::builder(emitter_pair(&archive))
            .num_active(1)
            .batch_size(10)
            .show_progress(false)
            .seed(105)
            .build()
            .unwrap();
        scheduler.run(&neg_l1_distance, 200).unwrap();
        let mut elites = archive.lock().unwrap().elites();
        elites.sort_by_key(|e| e.cell);
        elites
            .into_iter()
            .map(|e| (e.cell, e.objective))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
