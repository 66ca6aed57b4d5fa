use criterion::{criterion_group, criterion_main, Criterion};

use fr_llh::{EnergyDependence, LikelihoodEvaluator, LlhConfig};

fn bench_posterior(c: &mut Criterion) {
    for (label, energy_dependence) in [
        ("ln_posterior_mono", EnergyDependence::Mono),
        ("ln_posterior_spectral", EnergyDependence::Spectral),
    ] {
        let config = LlhConfig {
            energy_dependence,
            dimension: 6,
            ..LlhConfig::default()
        };
        let mut evaluator = LikelihoodEvaluator::from_config(&config, None).unwrap();
        let theta = evaluator.sampled().values();
        c.bench_function(label, |b| {
            b.iter(|| evaluator.ln_posterior(&theta).unwrap());
        });
    }
}

criterion_group!(benches, bench_posterior);
criterion_main!(benches);
