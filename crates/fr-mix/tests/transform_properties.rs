use fr_mix::{
    angles_to_composition, angles_to_unitary, apply_mixing, build_new_physics_unitary, composition_to_angles,
    normalize, standard_unitary, unitarity_deviation, MixingAngles, MASS_EIGENVALUES, UNITARITY_EPSILON,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn angles_to_unitary_is_unitary(
        s12_2 in 0.0f64..=1.0,
        c13_4 in 0.0f64..=1.0,
        s23_2 in 0.0f64..=1.0,
        dcp in 0.0f64..std::f64::consts::TAU,
    ) {
        let u = angles_to_unitary(&MixingAngles { s12_2, c13_4, s23_2, dcp }).unwrap();
        prop_assert!(unitarity_deviation(&u) < 1e-12);
    }

    #[test]
    fn new_physics_mixing_is_unitary(
        s12_2 in 0.0f64..=1.0,
        c13_4 in 0.0f64..=1.0,
        s23_2 in 0.0f64..=1.0,
        dcp in 0.0f64..std::f64::consts::TAU,
        log_scale in -40.0f64..-15.0,
        dimension in 3u32..=8,
        log_energy in 3.0f64..7.0,
    ) {
        let angles = MixingAngles { s12_2, c13_4, s23_2, dcp };
        let energy = 10f64.powf(log_energy);
        let scale = 10f64.powf(log_scale - 10.0 * f64::from(dimension - 3));
        let u = build_new_physics_unitary(&angles, dimension, energy, MASS_EIGENVALUES, &standard_unitary(), scale);
        let u = u.map_err(|err| TestCaseError::fail(err.to_string()))?;
        prop_assert!(unitarity_deviation(&u) < UNITARITY_EPSILON);
        let observed = apply_mixing([1.0, 2.0, 0.0], &u).unwrap();
        prop_assert!((observed.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_sums_to_one(
        a in 0.0f64..100.0,
        b in 0.0f64..100.0,
        c in 0.0f64..100.0,
    ) {
        prop_assume!(a + b + c > 1e-9);
        let n = normalize([a, b, c]).unwrap();
        prop_assert!((n.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn composition_round_trips_through_angles(
        a in 1e-3f64..1.0,
        b in 1e-3f64..1.0,
        c in 1e-3f64..1.0,
    ) {
        let composition = normalize([a, b, c]).unwrap();
        let back = angles_to_composition(composition_to_angles(composition).unwrap()).unwrap();
        for (x, y) in composition.iter().zip(back.iter()) {
            prop_assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn mixing_preserves_normalisation(
        a in 0.0f64..1.0,
        b in 0.0f64..1.0,
        c in 0.0f64..1.0,
        s12_2 in 0.0f64..=1.0,
        s23_2 in 0.0f64..=1.0,
        dcp in 0.0f64..std::f64::consts::TAU,
    ) {
        prop_assume!(a + b + c > 1e-6);
        let u = angles_to_unitary(&MixingAngles { s12_2, c13_4: 0.9, s23_2, dcp }).unwrap();
        let observed = apply_mixing([a, b, c], &u).unwrap();
        prop_assert!(observed.iter().all(|v| *v >= 0.0));
        prop_assert!((observed.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn zero_vector_cannot_be_normalised() {
    assert!(normalize([0.0, 0.0, 0.0]).unwrap_err().is_forbidden());
}

#[test]
fn standard_mixing_of_pion_source_matches_reference() {
    let observed = apply_mixing([1.0, 2.0, 0.0], &standard_unitary()).unwrap();
    let reference = [0.313547912785, 0.346028878346, 0.340423208869];
    for (x, y) in observed.iter().zip(reference.iter()) {
        assert!((x - y).abs() < 1e-9, "{x} vs {y}");
    }
}

#[test]
fn identity_mixing_is_a_no_op() {
    let u = angles_to_unitary(&MixingAngles {
        s12_2: 0.0,
        c13_4: 1.0,
        s23_2: 0.0,
        dcp: 0.0,
    })
    .unwrap();
    let observed = apply_mixing([0.2, 0.3, 0.5], &u).unwrap();
    for (x, y) in observed.iter().zip([0.2, 0.3, 0.5].iter()) {
        assert!((x - y).abs() < 1e-12);
    }
}
