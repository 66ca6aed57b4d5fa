//! Log-prior of a bound parameter set.

use fr_core::{Parameter, ParameterSet, Prior};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Log-prior contribution of a single parameter at its current value.
///
/// Returns `-inf` outside the closed range. The half-Gaussian adds the log
/// of the normal CDF evaluated at the upper bound.
pub fn ln_prior_term(param: &Parameter) -> f64 {
    let value = param.value();
    if !param.contains(value) {
        return f64::NEG_INFINITY;
    }
    let gaussian = match param.prior() {
        Prior::None => return 0.0,
        Prior::Gaussian | Prior::HalfGaussian => match Normal::new(value, param.std()) {
            Ok(dist) => dist,
            Err(_) => return f64::NEG_INFINITY,
        },
    };
    let mut term = gaussian.ln_pdf(param.nominal_value());
    if param.prior() == Prior::HalfGaussian {
        term += gaussian.cdf(param.ranges()[1]).ln();
    }
    term
}

/// Sum of [`ln_prior_term`] over the set; `-inf` as soon as one term is.
pub fn ln_prior(params: &ParameterSet) -> f64 {
    let mut total = 0.0;
    for param in params {
        let term = ln_prior_term(param);
        if term == f64::NEG_INFINITY {
            return term;
        }
        total += term;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use fr_core::{ParamTag, ParameterDef};
    use proptest::prelude::*;

    fn set(defs: Vec<ParameterDef>) -> ParameterSet {
        ParameterSet::from_defs(defs).unwrap()
    }

    #[test]
    fn flat_prior_is_zero_inside_and_neg_inf_outside() {
        let params = set(vec![ParameterDef::new(
            "a",
            0.5,
            [0.0, 1.0],
            1.0,
            Prior::None,
            ParamTag::None,
        )]);
        assert_eq!(ln_prior(&params), 0.0);
        params.set_values(&[1.0]).unwrap();
        assert_eq!(ln_prior(&params), 0.0);
        params.set_values(&[1.0 + 1e-12]).unwrap();
        assert_eq!(ln_prior(&params), f64::NEG_INFINITY);
    }

    #[test]
    fn gaussian_prior_matches_closed_form() {
        let params = set(vec![ParameterDef::new(
            "norm",
            1.3,
            [0.0, 50.0],
            0.3,
            Prior::Gaussian,
            ParamTag::Nuisance,
        )
        .with_nominal(1.0)]);
        let z: f64 = 0.3 / 0.3;
        let expected = -0.5 * z * z - (0.3 * (2.0 * std::f64::consts::PI).sqrt()).ln();
        assert!((ln_prior(&params) - expected).abs() < 1e-12);
    }

    #[test]
    fn half_gaussian_adds_upper_cdf() {
        let gaussian = set(vec![ParameterDef::new(
            "x",
            1.0,
            [0.0, 1.0],
            0.5,
            Prior::Gaussian,
            ParamTag::None,
        )]);
        let half = set(vec![ParameterDef::new(
            "x",
            1.0,
            [0.0, 1.0],
            0.5,
            Prior::HalfGaussian,
            ParamTag::None,
        )]);
        // value sits on the upper bound, so the CDF term is ln(1/2).
        let delta = ln_prior(&half) - ln_prior(&gaussian);
        assert!((delta - 0.5f64.ln()).abs() < 1e-9);
    }

    fn prior_strategy() -> impl Strategy<Value = Prior> {
        prop_oneof![Just(Prior::None), Just(Prior::Gaussian), Just(Prior::HalfGaussian)]
    }

    proptest! {
        #[test]
        fn out_of_range_values_have_no_prior_mass(
            prior in prior_strategy(),
            lo in -10.0f64..10.0,
            width in 0.1f64..10.0,
            outside in 1e-6f64..100.0,
            below in any::<bool>(),
        ) {
            let hi = lo + width;
            let params = set(vec![ParameterDef::new("x", lo, [lo, hi], 0.5, prior, ParamTag::None)]);
            let value = if below { lo - outside } else { hi + outside };
            params.set_values(&[value]).unwrap();
            prop_assert_eq!(ln_prior(&params), f64::NEG_INFINITY);
        }

        #[test]
        fn in_range_values_have_finite_prior(
            prior in prior_strategy(),
            fraction in 0.0f64..=1.0,
        ) {
            let params = set(vec![
                ParameterDef::new("x", 0.5, [0.0, 1.0], 0.5, prior, ParamTag::None),
                ParameterDef::new("y", 0.0, [-1.0, 1.0], 0.0, Prior::None, ParamTag::None),
            ]);
            params.set_values(&[fraction, 0.0]).unwrap();
            prop_assert!(ln_prior(&params).is_finite());
        }
    }
}
