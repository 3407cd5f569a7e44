//! Acquisition geometry consumed by the model.
//!
//! The crate does no file I/O; callers hand over plain arrays of b-values and
//! unit gradient directions and the table is read-only from then on.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::ShoreError;

const PI: f64 = std::f64::consts::PI;

/// Ordered (unit direction, b-value) pairs, one per signal sample.
///
/// Directions belonging to b = 0 samples may be zero vectors. Validated once
/// on construction; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GradientTable {
    bvals: Array1<f64>,
    bvecs: Array2<f64>,
}

impl GradientTable {
    pub fn new(bvals: Array1<f64>, bvecs: Array2<f64>) -> Result<Self, ShoreError> {
        if bvals.is_empty() {
            return Err(ShoreError::InvalidConfiguration(
                "gradient table is empty".into(),
            ));
        }
        if bvecs.nrows() != bvals.len() || bvecs.ncols() != 3 {
            return Err(ShoreError::InvalidConfiguration(format!(
                "expected a {} x 3 direction matrix, got {} x {}",
                bvals.len(),
                bvecs.nrows(),
                bvecs.ncols()
            )));
        }
        if bvals.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(ShoreError::InvalidConfiguration(
                "b-values must be finite and non-negative".into(),
            ));
        }
        if bvecs.iter().any(|v| !v.is_finite()) {
            return Err(ShoreError::InvalidConfiguration(
                "gradient directions contain non-finite components".into(),
            ));
        }
        Ok(GradientTable { bvals, bvecs })
    }

    /// Number of signal samples per voxel.
    pub fn len(&self) -> usize {
        self.bvals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bvals.is_empty()
    }

    pub fn bvals(&self) -> ArrayView1<'_, f64> {
        self.bvals.view()
    }

    pub fn bvecs(&self) -> ArrayView2<'_, f64> {
        self.bvecs.view()
    }

    /// Map every (direction, b-value) pair to its q-space coordinate through
    /// the diffusion-time constant tau: `q = sqrt(b / (4 pi^2 tau)) * dir`.
    pub fn q_vectors(&self, tau: f64) -> Array2<f64> {
        let mut q = self.bvecs.clone();
        for (mut row, &b) in q.axis_iter_mut(Axis(0)).zip(self.bvals.iter()) {
            let radius = (b / (4.0 * PI * PI * tau)).sqrt();
            row.mapv_inplace(|v| v * radius);
        }
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, Array1, Array2};

    #[test]
    fn rejects_empty_table() {
        let result = GradientTable::new(Array1::zeros(0), Array2::zeros((0, 3)));
        assert!(matches!(result, Err(ShoreError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let result = GradientTable::new(arr1(&[0.0, 1000.0]), Array2::zeros((3, 3)));
        assert!(matches!(result, Err(ShoreError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_negative_bvalues() {
        let result = GradientTable::new(arr1(&[-1.0]), arr2(&[[1.0, 0.0, 0.0]]));
        assert!(matches!(result, Err(ShoreError::InvalidConfiguration(_))));
    }

    #[test]
    fn q_radius_is_sqrt_b_for_reference_tau() {
        // With tau = 1 / (4 pi^2) the q-space radius reduces to sqrt(b).
        let gtab = GradientTable::new(
            arr1(&[0.0, 400.0, 900.0]),
            arr2(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
        )
        .unwrap();
        let q = gtab.q_vectors(1.0 / (4.0 * PI * PI));
        assert_relative_eq!(q[[0, 0]], 0.0);
        assert_relative_eq!(q[[1, 0]], 20.0, max_relative = 1e-12);
        assert_relative_eq!(q[[2, 1]], 30.0, max_relative = 1e-12);
    }
}
