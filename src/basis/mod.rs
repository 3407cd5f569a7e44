//! The Cartesian SHORE basis: index enumeration and the two evaluator
//! families (signal-domain phi, Fourier-domain psi).

mod hermite;
pub mod index;
pub mod phi;
pub mod psi;

pub(crate) use self::hermite::hermite_coefficients;
pub use self::index::{index_set, index_set_len, BasisIndex};
pub use self::phi::{phi_1d, phi_3d};
pub use self::psi::{psi_1d, psi_3d};
