//! Design (fitting) matrix construction.

use ndarray::{Array2, Axis};

use crate::basis::{index_set, phi_3d};
use crate::error::ShoreError;
use crate::gradient::GradientTable;

/// Build the fitting matrix: one row per gradient sample, one column per
/// basis index, entry (r, i) = `phi_3d(index_i, q_r, mu)` where `q_r` is the
/// sample's q-space coordinate under `tau`.
///
/// Column order follows [`index_set`]; the matrix depends only on the
/// gradient table and the model configuration, so it is computed once and
/// shared read-only across every voxel fit.
pub fn phi_matrix(
    radial_order: usize,
    mu: f64,
    gtab: &GradientTable,
    tau: f64,
) -> Result<Array2<f64>, ShoreError> {
    if !mu.is_finite() || mu <= 0.0 {
        return Err(ShoreError::InvalidConfiguration(format!(
            "scale parameter mu must be positive and finite, got {mu}"
        )));
    }
    if !tau.is_finite() || tau <= 0.0 {
        return Err(ShoreError::InvalidConfiguration(format!(
            "diffusion-time constant tau must be positive and finite, got {tau}"
        )));
    }
    let indices = index_set(radial_order);
    let q = gtab.q_vectors(tau);
    let mut phi = Array2::zeros((gtab.len(), indices.len()));
    for (r, mut row) in phi.axis_iter_mut(Axis(0)).enumerate() {
        let qv = [q[[r, 0]], q[[r, 1]], q[[r, 2]]];
        for (c, &index) in indices.iter().enumerate() {
            row[c] = phi_3d(index, qv, mu);
        }
    }
    Ok(phi)
}
