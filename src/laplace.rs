//! Closed-form Laplacian smoothness penalty.
//!
//! The 3-D Laplacian of a separable basis function splits into per-axis
//! second derivatives, so the roughness coupling between two basis functions
//! reduces to products of three kinds of 1-D integrals over the q-axis:
//! plain overlaps (S), one-sided second-derivative cross terms (L) and
//! products of two second derivatives (R). All three are closed forms in the
//! Hermite-function family; nothing is differentiated numerically. The signs
//! track the `i^-n` spectral phase of the signal-domain basis, which is why
//! S can be negative on odd diagonals.

use ndarray::Array2;

use crate::basis::{index_set, BasisIndex};

const PI: f64 = std::f64::consts::PI;

fn sign(order: usize) -> f64 {
    if order % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Overlap integral between basis orders `a` and `b` under scale `mu`.
/// Orthogonality leaves only the diagonal.
pub fn laplace_s(a: usize, b: usize, mu: f64) -> f64 {
    if a == b {
        sign(a) / (2.0 * PI.sqrt() * mu)
    } else {
        0.0
    }
}

/// Integral of the second derivative of order `a` against order `b`.
/// Symmetric in (a, b); non-zero only for |a - b| of 0 or 2.
pub fn laplace_l(a: usize, b: usize, mu: f64) -> f64 {
    let m = a.min(b);
    let mf = m as f64;
    match a.abs_diff(b) {
        0 => -sign(a) * (2.0 * mf + 1.0) * PI.powf(1.5) * mu,
        2 => -sign(m) * PI.powf(1.5) * mu * ((mf + 1.0) * (mf + 2.0)).sqrt(),
        _ => 0.0,
    }
}

/// Integral of the product of the second derivatives of orders `a` and `b`.
/// Symmetric in (a, b); non-zero only for |a - b| of 0, 2 or 4.
pub fn laplace_r(a: usize, b: usize, mu: f64) -> f64 {
    let m = a.min(b);
    let mf = m as f64;
    let scale = PI.powf(3.5) * mu.powi(3);
    match a.abs_diff(b) {
        0 => sign(a) * 6.0 * scale * (2.0 * mf * mf + 2.0 * mf + 1.0),
        2 => sign(m) * 4.0 * scale * (2.0 * mf + 3.0) * ((mf + 1.0) * (mf + 2.0)).sqrt(),
        4 => sign(m) * 2.0 * scale * ((mf + 1.0) * (mf + 2.0) * (mf + 3.0) * (mf + 4.0)).sqrt(),
        _ => 0.0,
    }
}

/// Laplacian coupling between two 3-D basis indices.
///
/// Each basis function contributes three second-derivative terms, one per
/// axis; pairing them gives the per-axis R terms weighted by the other two
/// axes' overlaps, plus the doubled cross-axis L terms.
pub fn laplace_delta(a: BasisIndex, b: BasisIndex, mu: f64) -> f64 {
    let mut s = [0.0; 3];
    let mut l = [0.0; 3];
    let mut r = [0.0; 3];
    for axis in 0..3 {
        s[axis] = laplace_s(a[axis], b[axis], mu);
        l[axis] = laplace_l(a[axis], b[axis], mu);
        r[axis] = laplace_r(a[axis], b[axis], mu);
    }
    r[0] * s[1] * s[2]
        + r[1] * s[0] * s[2]
        + r[2] * s[0] * s[1]
        + 2.0 * (l[0] * l[1] * s[2] + l[0] * l[2] * s[1] + l[1] * l[2] * s[0])
}

/// Symmetric regularization matrix over the whole index set of
/// `radial_order`, entry (i, j) = `laplace_delta(set[i], set[j], mu)`.
/// Depends only on the configuration, never on measured data.
pub fn laplace_reg_matrix(radial_order: usize, mu: f64) -> Array2<f64> {
    let indices = index_set(radial_order);
    let n = indices.len();
    let mut reg = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let value = laplace_delta(indices[i], indices[j], mu);
            reg[[i, j]] = value;
            reg[[j, i]] = value;
        }
    }
    reg
}
