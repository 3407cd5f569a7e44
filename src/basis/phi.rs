//! Signal-domain basis functions (phi).
//!
//! These expand the measured q-space signal. They are a distinct family from
//! the Fourier-domain duals in [`super::psi`]; the two must never be swapped
//! even though both reduce to weighted Hermite functions.

use super::hermite::hermite_gauss;
use super::index::BasisIndex;

const PI: f64 = std::f64::consts::PI;

/// Real part of the `i^-n` spectral phase carried by the order-n function.
fn phase(total_order: usize) -> f64 {
    match total_order % 4 {
        0 => 1.0,
        2 => -1.0,
        _ => 0.0,
    }
}

/// 1-D signal-domain basis function of order `n` and scale `mu` at `q`.
///
/// Evaluates at `t = 2 pi mu q`, normalized so `phi_1d(0, mu, 0.0) == 1.0`.
/// Odd orders are purely imaginary on their own, so their real value is zero;
/// they contribute to the 3-D product only through the joint phase, which
/// [`phi_3d`] applies across all three axes at once.
pub fn phi_1d(n: usize, mu: f64, q: f64) -> f64 {
    phase(n) * hermite_gauss(n, 2.0 * PI * mu * q)
}

/// Separable 3-D signal-domain basis function with a shared scale.
///
/// Zero whenever the total degree is odd; the enumerated index set only
/// contains even total degrees.
pub fn phi_3d(index: BasisIndex, q: [f64; 3], mu: f64) -> f64 {
    let mut value = phase(index[0] + index[1] + index[2]);
    if value == 0.0 {
        return 0.0;
    }
    for axis in 0..3 {
        value *= hermite_gauss(index[axis], 2.0 * PI * mu * q[axis]);
    }
    value
}
