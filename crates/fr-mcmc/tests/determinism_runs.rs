use fr_core::{FnDensity, FrError, ParamTag, ParameterDef, ParameterSet, Prior, RngHandle};
use fr_mcmc::determinism::seeding_seed;
use fr_mcmc::{flat_seed, run, run_parallel, EnsembleConfig, SeedPolicy};

const CENTER: [f64; 2] = [1.0, -2.0];

fn bowl(theta: &[f64]) -> f64 {
    -0.5 * theta
        .iter()
        .zip(CENTER)
        .map(|(x, c)| (x - c).powi(2))
        .sum::<f64>()
}

fn boxed(theta: &[f64]) -> f64 {
    if theta.iter().all(|x| (-0.5..=0.5).contains(x)) {
        0.0
    } else {
        f64::NEG_INFINITY
    }
}

fn small_config(seed: u64) -> EnsembleConfig {
    EnsembleConfig {
        nwalkers: 10,
        burnin: 2,
        nsteps: 5,
        threads: 1,
        seed_policy: SeedPolicy {
            master_seed: seed,
            label: None,
        },
        ..EnsembleConfig::default()
    }
}

fn start(seed: u64, half_width: f64, nwalkers: usize) -> Vec<Vec<f64>> {
    let params = ParameterSet::from_defs(CENTER.iter().enumerate().map(|(idx, &c)| {
        ParameterDef::new(
            format!("x{idx}"),
            c,
            [c - half_width, c + half_width],
            1.0,
            Prior::None,
            ParamTag::None,
        )
    }))
    .unwrap();
    let mut rng = RngHandle::from_seed(seeding_seed(seed));
    flat_seed(&params, nwalkers, &mut rng)
}

#[test]
fn chain_has_walker_times_steps_rows() {
    let config = small_config(7);
    let mut density = FnDensity::new(2, bowl);
    let result = run(&mut density, start(7, 2.0, 10), &config).unwrap();
    assert_eq!(result.chain.shape, [50, 2]);
    assert_eq!(result.chain.data.len(), 100);
    assert_eq!(result.ln_prob.len(), 50);
    assert_eq!(result.diagnostics.proposed, 5);
    assert_eq!(result.diagnostics.evaluations, 10 + 7 * 10);
}

#[test]
fn repeated_runs_with_same_seed_match() {
    let config = small_config(2024);
    let a = run(&mut FnDensity::new(2, bowl), start(2024, 2.0, 10), &config).unwrap();
    let b = run(&mut FnDensity::new(2, bowl), start(2024, 2.0, 10), &config).unwrap();
    assert_eq!(a, b);

    let other = run(&mut FnDensity::new(2, bowl), start(2024, 2.0, 10), &small_config(2025)).unwrap();
    assert_ne!(a.chain, other.chain);
}

#[test]
fn empirical_mean_tracks_the_bowl_center() {
    let mut average = [0.0; 2];
    let seeds = 0..8u64;
    let runs = seeds.clone().count() as f64;
    for seed in seeds {
        let result = run(&mut FnDensity::new(2, bowl), start(seed, 2.0, 10), &small_config(seed)).unwrap();
        let mean = result.chain.mean();
        for (idx, value) in mean.iter().enumerate() {
            assert!((value - CENTER[idx]).abs() < 2.0, "seed {seed}: {mean:?}");
            average[idx] += value / runs;
        }
    }
    for (value, center) in average.iter().zip(CENTER) {
        assert!((value - center).abs() < 0.75, "{average:?}");
    }
}

#[test]
fn threaded_evaluation_reproduces_serial_chain() {
    let serial = run(&mut FnDensity::new(2, bowl), start(11, 2.0, 10), &small_config(11)).unwrap();
    let threaded_config = EnsembleConfig {
        threads: 3,
        ..small_config(11)
    };
    let threaded = run_parallel(
        || Ok::<_, FrError>(FnDensity::new(2, bowl)),
        start(11, 2.0, 10),
        &threaded_config,
    )
    .unwrap();
    assert_eq!(serial, threaded);
}

#[test]
fn walkers_never_enter_forbidden_regions() {
    let config = EnsembleConfig {
        nwalkers: 8,
        burnin: 5,
        nsteps: 20,
        ..small_config(3)
    };
    let p0: Vec<Vec<f64>> = start(3, 0.4, 8)
        .into_iter()
        .map(|row| row.iter().zip(CENTER).map(|(x, c)| x - c).collect())
        .collect();
    let result = run(&mut FnDensity::new(2, boxed), p0, &config).unwrap();
    for row in result.chain.rows() {
        assert!(row.iter().all(|x| (-0.5..=0.5).contains(x)), "{row:?}");
    }
    assert!(result.ln_prob.iter().all(|value| *value == 0.0));
}

#[test]
fn invalid_layouts_are_rejected() {
    let mut density = FnDensity::new(2, bowl);
    let odd = EnsembleConfig {
        nwalkers: 9,
        ..small_config(1)
    };
    let err = run(&mut density, start(1, 2.0, 9), &odd).unwrap_err();
    assert!(matches!(err, FrError::Configuration(_)));

    let err = run(&mut density, start(1, 2.0, 8), &small_config(1)).unwrap_err();
    assert!(matches!(err, FrError::Shape(_)));
}
