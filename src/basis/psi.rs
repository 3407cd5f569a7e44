//! Fourier-domain dual basis functions (psi).
//!
//! These expand the diffusion propagator and drive ODF synthesis. They carry
//! a transform-domain normalization and, unlike the signal-domain family,
//! accept an independent scale per axis.

use super::hermite::hermite_gauss;
use super::index::BasisIndex;

const PI: f64 = std::f64::consts::PI;

/// 1-D Fourier dual of order `n` at displacement `x` under scale `mu`:
/// `H_n(x / mu) exp(-x^2 / 2 mu^2) / (sqrt(2^(n+1) pi n!) mu)`.
pub fn psi_1d(n: usize, x: f64, mu: f64) -> f64 {
    hermite_gauss(n, x / mu) / ((2.0 * PI).sqrt() * mu)
}

/// Separable 3-D dual with independent per-axis scales.
pub fn psi_3d(index: BasisIndex, x: [f64; 3], mu: [f64; 3]) -> f64 {
    psi_1d(index[0], x[0], mu[0]) * psi_1d(index[1], x[1], mu[1]) * psi_1d(index[2], x[2], mu[2])
}
