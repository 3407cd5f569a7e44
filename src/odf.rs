//! ODF synthesis from the Fourier-domain basis.
//!
//! The orientation distribution function at a unit direction v is the radial
//! moment `int_0^inf r^s P(r v) dr` of the propagator. Expanding the three
//! axis Hermite polynomials of each psi function in monomials of r turns the
//! integral into a finite sum of `int_0^inf r^(s+k) exp(-alpha r^2) dr`
//! terms, each a half-integer gamma value. No quadrature is involved.

use ndarray::{Array2, ArrayView2};

use crate::basis::{hermite_coefficients, BasisIndex};

const PI: f64 = std::f64::consts::PI;

/// `Gamma(m / 2)` for positive integer `m`, from `Gamma(1/2) = sqrt(pi)`,
/// `Gamma(1) = 1` and the factorial recurrence. Exact up to rounding.
fn half_integer_gamma(m: usize) -> f64 {
    debug_assert!(m > 0);
    let mut value = if m % 2 == 0 { 1.0 } else { PI.sqrt() };
    let mut z = if m % 2 == 0 { 2 } else { 1 };
    while z < m {
        value *= z as f64 / 2.0;
        z += 2;
    }
    value
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Closed-form `int_0^inf r^smoment psi_3d(index, r v, mu) dr` for one unit
/// direction v, with `beta[axis] = v[axis] / mu[axis]` precomputed and
/// `alpha = sum(beta^2) / 2`.
fn radial_moment(
    index: BasisIndex,
    beta: [f64; 3],
    mu: [f64; 3],
    alpha: f64,
    smoment: usize,
) -> f64 {
    let mut norm = 1.0;
    for axis in 0..3 {
        let n = index[axis];
        norm /= (2f64.powi(n as i32 + 1) * PI * factorial(n)).sqrt() * mu[axis];
    }
    // Coefficients of H_nx(bx r) H_ny(by r) H_nz(bz r) in powers of r.
    let mut poly = vec![1.0];
    for axis in 0..3 {
        let coeffs = hermite_coefficients(index[axis]);
        let mut scaled = Vec::with_capacity(coeffs.len());
        let mut power = 1.0;
        for &c in &coeffs {
            scaled.push(c * power);
            power *= beta[axis];
        }
        poly = convolve(&poly, &scaled);
    }
    let mut total = 0.0;
    for (k, &a) in poly.iter().enumerate() {
        if a != 0.0 {
            let order = smoment + k + 1;
            total += a * 0.5 * half_integer_gamma(order) * alpha.powf(-(order as f64) / 2.0);
        }
    }
    norm * total
}

/// Radial-moment weights of every basis index at every sample direction.
///
/// Entry (d, i) is the closed-form radial integral of `psi_3d(index_i, ..)`
/// along direction d, so the ODF at that direction is the dot product of row
/// d with a fitted coefficient vector. `smoment` is the radial exponent; 0
/// gives the plain propagator integral, higher even moments sharpen the
/// profile.
pub fn odf_matrix(
    indices: &[BasisIndex],
    mu: [f64; 3],
    vertices: ArrayView2<'_, f64>,
    smoment: usize,
) -> Array2<f64> {
    let mut matrix = Array2::zeros((vertices.nrows(), indices.len()));
    for d in 0..vertices.nrows() {
        let v = [vertices[[d, 0]], vertices[[d, 1]], vertices[[d, 2]]];
        let beta = [v[0] / mu[0], v[1] / mu[1], v[2] / mu[2]];
        let alpha = 0.5 * (beta[0] * beta[0] + beta[1] * beta[1] + beta[2] * beta[2]);
        for (col, &index) in indices.iter().enumerate() {
            matrix[[d, col]] = radial_moment(index, beta, mu, alpha, smoment);
        }
    }
    matrix
}
