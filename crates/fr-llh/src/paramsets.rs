//! Canonical parameter sets: the external-fitter hypothesis and the sampled set.

use std::f64::consts::PI;

use fr_core::errors::FrError;
use fr_core::{ParamTag, Parameter, ParameterDef, ParameterSet, Prior};
use fr_mix::composition_to_angles;

use crate::config::ResolvedLlh;

const ANGLE_EPSILON: f64 = 1e-10;

/// Phase range `[0, 2π)`; the upper end stops short of the wrap-around.
const PHASE_RANGE: [f64; 2] = [0.0, 2.0 * PI - ANGLE_EPSILON];

/// Default detector and astrophysical nuisance parameters.
pub fn nuisance_defs() -> Vec<ParameterDef> {
    let nuisance = |name: &str, value: f64, seed: [f64; 2], ranges: [f64; 2], std: f64, tex: &str| {
        ParameterDef::new(name, value, ranges, std, Prior::Gaussian, ParamTag::Nuisance)
            .with_seed(seed)
            .with_tex(tex)
    };
    vec![
        nuisance("convNorm", 1.0, [0.5, 2.0], [0.0, 50.0], 0.3, r"\rm convNorm"),
        nuisance("promptNorm", 0.0, [0.0, 6.0], [0.0, 50.0], 0.05, r"\rm promptNorm"),
        nuisance("muonNorm", 1.0, [0.1, 2.0], [0.0, 50.0], 0.1, r"\rm muonNorm"),
        nuisance("astroNorm", 6.9, [0.1, 10.0], [0.0, 50.0], 0.1, r"\rm astroNorm"),
        nuisance("astroDeltaGamma", 2.5, [1.0, 3.0], [-5.0, 5.0], 0.1, r"\rm astroDeltaGamma"),
    ]
}

/// Builds the nuisance set, applying injected values from the configuration.
pub fn define_nuisance(settings: &ResolvedLlh) -> Result<ParameterSet, FrError> {
    let defs = nuisance_defs().into_iter().map(|mut def| {
        if let Some(&injected) = settings.config.nuisance.get(&def.name) {
            def.value = injected;
            def.nominal_value = Some(injected);
        }
        def
    });
    ParameterSet::from_defs(defs)
}

/// Hypothesis set for the external fitter and the sampled set, in that order.
///
/// With an external likelihood both sets hold the same nuisance handles, so
/// binding the sampled set also moves the hypothesis nuisances.
pub fn build_paramsets(settings: &ResolvedLlh) -> Result<(ParameterSet, ParameterSet), FrError> {
    let config = &settings.config;
    let nuisance: Vec<Parameter> = if config.likelihood.is_external() {
        define_nuisance(settings)?.iter().cloned().collect()
    } else {
        Vec::new()
    };

    let flavour = composition_to_angles(config.measured_ratio)?;
    let mut hypothesis = nuisance.clone();
    hypothesis.push(Parameter::define(
        ParameterDef::new(
            "astroFlavorAngle1",
            flavour[0],
            [0.0, 1.0],
            0.2,
            Prior::None,
            ParamTag::BestFit,
        )
        .with_tex(r"\rm astroFlavorAngle1"),
    )?);
    hypothesis.push(Parameter::define(
        ParameterDef::new(
            "astroFlavorAngle2",
            flavour[1],
            [-1.0, 1.0],
            0.2,
            Prior::None,
            ParamTag::BestFit,
        )
        .with_tex(r"\rm astroFlavorAngle2"),
    )?);

    let mut sampled = nuisance;
    for def in sampled_defs(settings) {
        sampled.push(Parameter::define(def)?);
    }
    Ok((ParameterSet::new(hypothesis)?, ParameterSet::new(sampled)?))
}

fn sampled_defs(settings: &ResolvedLlh) -> Vec<ParameterDef> {
    let config = &settings.config;
    let mut defs = Vec::new();
    let angle = |name: &str, value: f64, ranges: [f64; 2], tex: &str| {
        ParameterDef::new(name, value, ranges, 0.2, Prior::None, ParamTag::MixingAngle).with_tex(tex)
    };
    let unit = [ANGLE_EPSILON, 1.0 - ANGLE_EPSILON];
    if !config.fix_mixing && !config.fix_mixing_almost {
        defs.push(angle("s_12^2", 0.5, unit, r"\tilde{s}_{12}^2"));
        defs.push(angle("c_13^4", 0.5, unit, r"\tilde{c}_{13}^4"));
        defs.push(angle("s_23^2", 0.5, unit, r"\tilde{s}_{23}^2"));
        defs.push(angle("dcp", PI, PHASE_RANGE, r"\tilde{\delta_{CP}}"));
    } else if config.fix_mixing_almost {
        defs.push(angle("s_23^2", 0.5, [0.0, 1.0], r"\tilde{s}_{23}^4"));
    }
    if !config.fix_scale {
        defs.push(
            ParameterDef::new(
                "logLam",
                settings.log_scale(),
                settings.log_scale_region,
                3.0,
                Prior::None,
                ParamTag::Scale,
            )
            .with_tex(format!(r"{{\rm log}}_{{10}}\Lambda^{{-1}}_{{{}}}", config.dimension)),
        );
    }
    if !config.fix_source_ratio {
        let source = |name: &str, ranges: [f64; 2], tex: &str| {
            ParameterDef::new(name, 0.5, ranges, 0.2, Prior::None, ParamTag::SourceAngle).with_tex(tex)
        };
        defs.push(source("s_phi4", [0.0, 1.0], r"sin^4(\phi)"));
        defs.push(source("c_2psi", [-1.0, 1.0], r"cos(2\psi)"));
    }
    defs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Likelihood, LlhConfig};

    fn resolve(config: LlhConfig) -> ResolvedLlh {
        config.resolve().unwrap()
    }

    #[test]
    fn default_sampled_set_orders_angles_scale_source() {
        let (hypothesis, sampled) = build_paramsets(&resolve(LlhConfig::default())).unwrap();
        assert_eq!(
            sampled.names(),
            vec!["s_12^2", "c_13^4", "s_23^2", "dcp", "logLam", "s_phi4", "c_2psi"]
        );
        assert_eq!(hypothesis.names(), vec!["astroFlavorAngle1", "astroFlavorAngle2"]);
    }

    #[test]
    fn phase_range_excludes_full_turn() {
        let (_, sampled) = build_paramsets(&resolve(LlhConfig::default())).unwrap();
        let dcp = sampled.by_name("dcp").unwrap();
        assert!(dcp.contains(0.0));
        assert!(dcp.contains(PI));
        assert!(!dcp.contains(2.0 * PI));
        assert!(dcp.ranges()[1] < 2.0 * PI);
    }

    #[test]
    fn toggles_drop_parameters() {
        let config = LlhConfig {
            fix_mixing_almost: true,
            fix_source_ratio: true,
            ..LlhConfig::default()
        };
        let (_, sampled) = build_paramsets(&resolve(config)).unwrap();
        assert_eq!(sampled.names(), vec!["s_23^2", "logLam"]);

        let config = LlhConfig {
            fix_mixing: true,
            ..LlhConfig::default()
        };
        let (_, sampled) = build_paramsets(&resolve(config)).unwrap();
        assert!(sampled.from_tag(&[ParamTag::MixingAngle], false).is_empty());
    }

    #[test]
    fn external_sets_share_nuisance_handles() {
        let config = LlhConfig {
            likelihood: Likelihood::External,
            ..LlhConfig::default()
        };
        let (hypothesis, sampled) = build_paramsets(&resolve(config)).unwrap();
        assert_eq!(sampled.from_tag(&[ParamTag::Nuisance], false).len(), 5);
        sampled.by_name("astroNorm").unwrap().set_value(3.0);
        assert_eq!(hypothesis.by_name("astroNorm").unwrap().value(), 3.0);
    }

    #[test]
    fn injected_nuisance_overrides_default() {
        let mut config = LlhConfig {
            likelihood: Likelihood::External,
            ..LlhConfig::default()
        };
        config.nuisance.insert("convNorm".to_owned(), 1.4);
        let nuisance = define_nuisance(&resolve(config)).unwrap();
        let conv = nuisance.by_name("convNorm").unwrap();
        assert_eq!(conv.value(), 1.4);
        assert_eq!(conv.nominal_value(), 1.4);
    }

    #[test]
    fn best_fit_angles_follow_measured_ratio() {
        let config = LlhConfig {
            measured_ratio: [1.0, 2.0, 0.0],
            ..LlhConfig::default()
        };
        let (hypothesis, _) = build_paramsets(&resolve(config)).unwrap();
        let angles = hypothesis.values_from_tag(&[ParamTag::BestFit], false);
        assert!((angles[0] - 1.0).abs() < 1e-12);
        assert!((angles[1] + 1.0 / 3.0).abs() < 1e-12);
    }
}
