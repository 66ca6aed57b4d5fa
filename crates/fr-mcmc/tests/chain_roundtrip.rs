use fr_core::FnDensity;
use fr_mcmc::{load_chain, run, write_artifacts, EnsembleConfig, RunManifest, SeedPolicy};
use tempfile::tempdir;

fn bowl(theta: &[f64]) -> f64 {
    -0.5 * theta.iter().map(|x| x * x).sum::<f64>()
}

#[test]
fn artefacts_round_trip_through_disk() {
    let dir = tempdir().unwrap();
    let mut config = EnsembleConfig {
        nwalkers: 6,
        burnin: 1,
        nsteps: 4,
        seed_policy: SeedPolicy {
            master_seed: 99,
            label: Some("roundtrip".into()),
        },
        ..EnsembleConfig::default()
    };
    config.output.run_directory = Some(dir.path().join("run"));

    let p0 = (0..6)
        .map(|walker| vec![walker as f64 * 0.1 - 0.3, 0.2, -0.1])
        .collect();
    let result = run(&mut FnDensity::new(3, bowl), p0, &config).unwrap();
    let names = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
    let paths = write_artifacts(&result, &config, &names).unwrap().unwrap();

    let chain = load_chain(&paths.chain).unwrap();
    assert_eq!(chain, result.chain);
    assert_eq!(chain.shape, [24, 3]);

    let manifest = RunManifest::load(&paths.manifest).unwrap();
    assert_eq!(manifest.parameter_names, names);
    assert_eq!(manifest.master_seed, 99);
    assert_eq!(manifest.seed_label.as_deref(), Some("roundtrip"));
    assert_eq!(manifest.diagnostics, result.diagnostics);

    let csv = std::fs::read_to_string(&paths.metrics).unwrap();
    assert_eq!(csv.lines().count(), 7);
}

#[test]
fn nothing_is_written_without_a_run_directory() {
    let config = EnsembleConfig {
        nwalkers: 4,
        burnin: 0,
        nsteps: 2,
        ..EnsembleConfig::default()
    };
    let p0 = vec![vec![0.1], vec![-0.1], vec![0.2], vec![-0.2]];
    let result = run(&mut FnDensity::new(1, bowl), p0, &config).unwrap();
    assert!(write_artifacts(&result, &config, &["x".to_owned()]).unwrap().is_none());
}

#[test]
fn truncated_chain_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chain.bin");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();
    let err = load_chain(&path).unwrap_err();
    assert!(matches!(err, fr_core::FrError::Io(_)));
}
