#![deny(missing_docs)]
#![doc = "Pure numeric transforms between flavour compositions, mixing angles and unitary mixing matrices, including the new-physics perturbation."]

pub mod bsm;
pub mod composition;
pub mod propagate;
pub mod unitary;

pub use bsm::{build_new_physics_unitary, MixingMode, NewPhysics, ResolvedTheta};
pub use composition::{angles_to_composition, composition_to_angles, normalize, Composition};
pub use propagate::{apply_mixing, transition_matrix};
pub use unitary::{
    angles_to_unitary, check_unitarity, standard_unitary, unitarity_deviation, MixingAngles,
    Unitary, MASS_EIGENVALUES, UNITARITY_EPSILON,
};
