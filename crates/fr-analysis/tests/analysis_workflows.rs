use std::fs;
use std::sync::{Arc, Mutex};

use fr_analysis::{
    angles_correlation_scan, angles_limit_scan, bayes_factor_limit, bayesian_scale_scan, frequentist_scale_scan,
    run_evidence, run_mcmc, scan_grid, AnalysisConfig, ScanConfig, SearchConfig, ANGLE_SCENARIOS, FORBIDDEN_PENALTY,
};
use fr_core::FrError;
use fr_llh::{EnergyDependence, ExternalFitter, FitMode, FitRequest, FitterFactory, Likelihood, LlhConfig};
use fr_mcmc::{load_chain, EnsembleConfig};
use fr_nest::{read_global_evidence, NestConfig};
use tempfile::tempdir;

fn flat_llh() -> LlhConfig {
    LlhConfig {
        likelihood: Likelihood::Flat,
        energy_dependence: EnergyDependence::Mono,
        energy: 1e5,
        fix_mixing_almost: true,
        fix_scale: true,
        ..LlhConfig::default()
    }
}

fn small_ensemble(threads: usize) -> EnsembleConfig {
    EnsembleConfig {
        nwalkers: 8,
        burnin: 5,
        nsteps: 10,
        threads,
        ..EnsembleConfig::default()
    }
}

#[test]
fn mcmc_run_writes_a_loadable_chain() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempdir().unwrap();
    let mut config = AnalysisConfig {
        llh: flat_llh(),
        ensemble: small_ensemble(1),
        ..AnalysisConfig::default()
    };
    config.ensemble.output.run_directory = Some(dir.path().join("mcmc"));

    let outcome = run_mcmc(&config, None).unwrap();
    assert_eq!(outcome.parameter_names, vec!["s_23^2", "s_phi4", "c_2psi"]);
    assert_eq!(outcome.run.chain.shape, [80, 3]);
    let stats = outcome.stats.unwrap();
    assert_eq!(stats.evaluations, 8 + 15 * 8);

    let paths = outcome.artifacts.unwrap();
    assert_eq!(load_chain(&paths.chain).unwrap(), outcome.run.chain);
}

#[test]
fn threaded_mcmc_matches_serial() {
    let serial = AnalysisConfig {
        llh: flat_llh(),
        ensemble: small_ensemble(1),
        ..AnalysisConfig::default()
    };
    let threaded = AnalysisConfig {
        ensemble: small_ensemble(3),
        ..serial.clone()
    };
    let a = run_mcmc(&serial, None).unwrap();
    let b = run_mcmc(&threaded, None).unwrap();
    assert_eq!(a.run.chain, b.run.chain);
    assert!(b.stats.is_none());
}

#[test]
fn external_likelihood_needs_a_fitter() {
    let config = AnalysisConfig {
        llh: LlhConfig {
            likelihood: Likelihood::External,
            ..flat_llh()
        },
        ensemble: small_ensemble(1),
        ..AnalysisConfig::default()
    };
    assert_eq!(run_mcmc(&config, None).unwrap_err().info().code, "fitter-missing");
}

#[test]
fn flat_evidence_is_at_most_one() {
    let dir = tempdir().unwrap();
    let config = AnalysisConfig {
        llh: flat_llh(),
        nest: NestConfig {
            live_points: 40,
            tolerance: 0.2,
            output_prefix: dir.path().join("full_"),
            ..NestConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let result = run_evidence(&config, None).unwrap();
    assert!(result.ln_evidence <= 1e-9);
    assert!(!result.samples.is_empty());
    assert_eq!(read_global_evidence(&config.nest.output_prefix).unwrap(), result.ln_evidence);
}

#[test]
fn bayesian_scan_evaluates_selected_bins() {
    let dir = tempdir().unwrap();
    let prefix = dir.path().join("scan_");
    let config = AnalysisConfig {
        llh: LlhConfig {
            fix_scale: false,
            fix_source_ratio: true,
            ..flat_llh()
        },
        scan: ScanConfig {
            bins: 3,
            eval_bins: Some(vec![0, 2]),
            live_points: 20,
            tolerance: 0.5,
            output_prefix: prefix.clone(),
            ..ScanConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let points = bayesian_scale_scan(&config, None).unwrap();
    let grid = scan_grid([-30.0, -10.0], 3);
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].log_scale, grid[0]);
    assert_eq!(points[1].log_scale, grid[2]);

    let mut first = prefix.into_os_string();
    first.push("bin00_");
    assert_eq!(read_global_evidence(first.as_ref()).unwrap(), points[0].value);
    let table = fs::read_to_string(dir.path().join("scan_bayesian.csv")).unwrap();
    assert_eq!(table.lines().count(), 3);
}

#[test]
fn scans_need_a_free_scale() {
    let config = AnalysisConfig {
        llh: flat_llh(),
        ..AnalysisConfig::default()
    };
    let err = bayesian_scale_scan(&config, None).unwrap_err();
    assert_eq!(err.info().code, "scan-scale-fixed");
}

#[test]
fn frequentist_scan_needs_every_mixing_angle() {
    let dir = tempdir().unwrap();
    let config = AnalysisConfig {
        llh: LlhConfig {
            fix_scale: false,
            ..flat_llh()
        },
        scan: ScanConfig {
            output_prefix: dir.path().join("freq_"),
            ..ScanConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let err = frequentist_scale_scan(&config, None).unwrap_err();
    assert_eq!(err.info().code, "scan-parameters");
}

#[test]
fn frequentist_scan_maximises_over_magnitudes() {
    let dir = tempdir().unwrap();
    let config = AnalysisConfig {
        llh: LlhConfig {
            likelihood: Likelihood::Gaussian,
            energy_dependence: EnergyDependence::Mono,
            energy: 1e5,
            fix_source_ratio: true,
            source_ratio: [1.0, 2.0, 0.0],
            ..LlhConfig::default()
        },
        scan: ScanConfig {
            bins: 3,
            output_prefix: dir.path().join("freq_"),
            search: SearchConfig {
                max_iters: 40,
                ..SearchConfig::default()
            },
            ..ScanConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let points = frequentist_scale_scan(&config, None).unwrap();
    assert_eq!(points.len(), 3);
    assert!(points[0].value > -FORBIDDEN_PENALTY);
    for point in &points {
        let best = point.best_fit.as_ref().unwrap();
        assert_eq!(best.len(), 3);
        assert!(best.iter().all(|x| (0.0..=1.0).contains(x)));
    }
    let table = fs::read_to_string(dir.path().join("freq_frequentist.csv")).unwrap();
    assert_eq!(table.lines().count(), 4);
}

#[test]
fn limit_from_a_scan_table() {
    let scales = scan_grid([-30.0, -20.0], 6);
    let evidence: Vec<f64> = scales
        .iter()
        .map(|s| if *s < -25.0 { -4.0 } else { -4.0 - (s + 25.0) * 3.0 })
        .collect();
    let limit = bayes_factor_limit(&scales, &evidence, 1.0).unwrap().unwrap();
    assert!(limit > -25.0 && limit < -23.0, "{limit}");
}

fn mode_recorder() -> (FitterFactory, Arc<Mutex<Vec<FitMode>>>) {
    let modes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&modes);
    let factory: FitterFactory = Arc::new(move || {
        let sink = Arc::clone(&sink);
        Box::new(move |request: &FitRequest| -> Result<f64, FrError> {
            sink.lock().unwrap().push(request.mode);
            let norm = request.params.get("astroNorm").copied().unwrap_or(0.0);
            Ok(-(norm - 6.0).powi(2))
        }) as Box<dyn ExternalFitter>
    });
    (factory, modes)
}

fn external_scan_config(prefix: &std::path::Path, bins: usize) -> AnalysisConfig {
    AnalysisConfig {
        llh: LlhConfig {
            likelihood: Likelihood::External,
            energy_dependence: EnergyDependence::Mono,
            energy: 1e5,
            fix_source_ratio: true,
            source_ratio: [1.0, 2.0, 0.0],
            ..LlhConfig::default()
        },
        scan: ScanConfig {
            bins,
            output_prefix: prefix.to_path_buf(),
            search: SearchConfig {
                max_iters: 5,
                ..SearchConfig::default()
            },
            ..ScanConfig::default()
        },
        ..AnalysisConfig::default()
    }
}

#[test]
fn frequentist_scan_asks_the_fitter_to_minimise() {
    let dir = tempdir().unwrap();
    let (fitter, modes) = mode_recorder();
    let config = external_scan_config(&dir.path().join("freq_"), 2);
    let points = frequentist_scale_scan(&config, Some(fitter)).unwrap();
    assert_eq!(points.len(), 2);
    let modes = modes.lock().unwrap();
    assert!(!modes.is_empty());
    assert!(modes.iter().all(|mode| *mode == FitMode::Minimize), "{modes:?}");
}

#[test]
fn angles_limit_scan_covers_each_scenario() {
    let dir = tempdir().unwrap();
    let config = AnalysisConfig {
        llh: LlhConfig {
            likelihood: Likelihood::Gaussian,
            ..external_scan_config(dir.path(), 3).llh
        },
        scan: ScanConfig {
            bins: 3,
            eval_bins: Some(vec![0, 2]),
            output_prefix: dir.path().join("ang_"),
            ..ScanConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let points = angles_limit_scan(&config, None).unwrap();
    assert_eq!(points.len(), ANGLE_SCENARIOS * 2);
    let grid = scan_grid([-30.0, -10.0], 3);
    for (i, point) in points.iter().enumerate() {
        assert_eq!(point.scenario, i / 2);
        assert_eq!(point.log_scale, if i % 2 == 0 { grid[0] } else { grid[2] });
        assert!(point.angle.is_none());
        assert!(point.llh.is_finite() || point.llh.is_nan());
    }
    let table = fs::read_to_string(dir.path().join("ang_angles_limit.csv")).unwrap();
    assert_eq!(table.lines().count(), 1 + ANGLE_SCENARIOS * 2);
    assert!(table.starts_with("scenario,log_scale,angle,llh"));
}

#[test]
fn angles_correlation_scan_crosses_scale_and_angle() {
    let dir = tempdir().unwrap();
    let (fitter, modes) = mode_recorder();
    let config = external_scan_config(&dir.path().join("corr_"), 2);
    let points = angles_correlation_scan(&config, Some(fitter)).unwrap();
    assert_eq!(points.len(), ANGLE_SCENARIOS * 2 * 2);
    let angles: Vec<f64> = points[..2].iter().map(|p| p.angle.unwrap()).collect();
    assert_eq!(angles, vec![0.0, 1.0]);
    assert!(modes.lock().unwrap().iter().all(|mode| *mode == FitMode::Minimize));
    let table = fs::read_to_string(dir.path().join("corr_angles_corr.csv")).unwrap();
    assert_eq!(table.lines().count(), 1 + points.len());
}
