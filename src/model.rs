//! Per-voxel regularized least-squares fitting and ODF evaluation.

use nalgebra::{linalg::Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis};
use rayon::prelude::*;

use crate::basis::{index_set, BasisIndex};
use crate::cache::BasisCache;
use crate::design::phi_matrix;
use crate::error::ShoreError;
use crate::gradient::GradientTable;
use crate::laplace::laplace_reg_matrix;
use crate::odf::odf_matrix;

const PI: f64 = std::f64::consts::PI;

/// Immutable per-model parameters. Created once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShoreCartConfig {
    /// Maximum total polynomial degree of the basis.
    pub radial_order: usize,
    /// Isotropic spatial scale of the basis functions.
    pub mu: f64,
    /// Laplacian regularization weight; 0 degenerates to ordinary least
    /// squares.
    pub lambda: f64,
    /// Diffusion-time constant relating b-values to q-space radii.
    pub tau: f64,
}

impl ShoreCartConfig {
    /// Scale derived from the companion spherical model's zeta parameter.
    pub fn mu_from_zeta(zeta: f64) -> f64 {
        1.0 / (2.0 * PI * zeta.sqrt())
    }
}

impl Default for ShoreCartConfig {
    fn default() -> Self {
        ShoreCartConfig {
            radial_order: 6,
            mu: Self::mu_from_zeta(700.0),
            lambda: 0.0,
            tau: 1.0 / (4.0 * PI * PI),
        }
    }
}

/// The unfit state: configuration plus every voxel-independent
/// precomputation (design matrix, regularization matrix and the Cholesky
/// factor of the regularized normal matrix).
///
/// All of it is read-only after construction, so a model can be shared
/// freely across threads and reused for any number of volumes acquired with
/// the same gradient table.
#[derive(Debug)]
pub struct ShoreCartModel {
    config: ShoreCartConfig,
    gtab: GradientTable,
    indices: Vec<BasisIndex>,
    phi: Array2<f64>,
    regularization: Array2<f64>,
    normal_cholesky: Cholesky<f64, Dyn>,
}

impl ShoreCartModel {
    pub fn new(gtab: GradientTable, config: ShoreCartConfig) -> Result<Self, ShoreError> {
        let indices = index_set(config.radial_order);
        let regularization = laplace_reg_matrix(config.radial_order, config.mu);
        Self::build(gtab, config, indices, regularization)
    }

    /// Like [`ShoreCartModel::new`], but takes the index set and
    /// regularization matrix from `cache`, building them only when the
    /// (radial order, scale) key is missing.
    pub fn with_cache(
        gtab: GradientTable,
        config: ShoreCartConfig,
        cache: &BasisCache,
    ) -> Result<Self, ShoreError> {
        let entry = cache.get_or_build(config.radial_order, config.mu);
        Self::build(
            gtab,
            config,
            entry.indices.clone(),
            entry.regularization.clone(),
        )
    }

    fn build(
        gtab: GradientTable,
        config: ShoreCartConfig,
        indices: Vec<BasisIndex>,
        regularization: Array2<f64>,
    ) -> Result<Self, ShoreError> {
        if !config.lambda.is_finite() {
            return Err(ShoreError::InvalidConfiguration(format!(
                "regularization weight lambda must be finite, got {}",
                config.lambda
            )));
        }
        let phi = phi_matrix(config.radial_order, config.mu, &gtab, config.tau)?;
        let mut normal = phi.t().dot(&phi);
        normal.scaled_add(config.lambda, &regularization);
        let n = indices.len();
        let normal = DMatrix::from_fn(n, n, |i, j| normal[[i, j]]);
        let normal_cholesky = normal.cholesky().ok_or(ShoreError::SingularSystem)?;
        Ok(ShoreCartModel {
            config,
            gtab,
            indices,
            phi,
            regularization,
            normal_cholesky,
        })
    }

    pub fn config(&self) -> &ShoreCartConfig {
        &self.config
    }

    pub fn gradient_table(&self) -> &GradientTable {
        &self.gtab
    }

    /// Basis indices in coefficient-vector order.
    pub fn indices(&self) -> &[BasisIndex] {
        &self.indices
    }

    /// The fitting matrix, rows aligned with the gradient table.
    pub fn design_matrix(&self) -> &Array2<f64> {
        &self.phi
    }

    /// The symmetric Laplacian penalty matrix.
    pub fn regularization_matrix(&self) -> &Array2<f64> {
        &self.regularization
    }

    /// Fit every voxel of `signal`, whose trailing axis must match the
    /// gradient table. Any leading axes are treated as independent voxels
    /// and solved in parallel against the shared precomputed factorization.
    ///
    /// Voxels containing non-finite samples are skipped: their coefficient
    /// vectors are NaN and their flat indices appear in
    /// [`ShoreCartFit::failed_voxels`]. The call itself only fails for
    /// configuration-level problems, before any voxel is processed.
    pub fn fit(&self, signal: ArrayViewD<'_, f64>) -> Result<ShoreCartFit<'_>, ShoreError> {
        let n_samples = self.gtab.len();
        let ndim = signal.ndim();
        let got = if ndim == 0 { 0 } else { signal.shape()[ndim - 1] };
        if got != n_samples {
            return Err(ShoreError::ShapeMismatch {
                expected: n_samples,
                got,
            });
        }
        let spatial: Vec<usize> = signal.shape()[..ndim - 1].to_vec();
        let n_voxels: usize = spatial.iter().product();
        let n_coef = self.indices.len();

        let flat = signal
            .to_owned()
            .into_shape((n_voxels, n_samples))
            .expect("owned signal volume is contiguous");

        let mut coefficients = Array2::zeros((n_voxels, n_coef));
        let solved: Vec<bool> = coefficients
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .map(|(voxel, mut row)| {
                let sample = flat.row(voxel);
                if sample.iter().any(|v| !v.is_finite()) {
                    row.fill(f64::NAN);
                    return false;
                }
                let rhs = self.phi.t().dot(&sample);
                let rhs = DVector::from_iterator(n_coef, rhs.iter().copied());
                let solution = self.normal_cholesky.solve(&rhs);
                for (dst, src) in row.iter_mut().zip(solution.iter()) {
                    *dst = *src;
                }
                true
            })
            .collect();
        let failed_voxels = solved
            .iter()
            .enumerate()
            .filter_map(|(voxel, ok)| (!ok).then_some(voxel))
            .collect();

        let mut shape = spatial;
        shape.push(n_coef);
        let coefficients = coefficients
            .into_shape(shape)
            .expect("coefficient rows reshape to the voxel grid");
        Ok(ShoreCartFit {
            model: self,
            coefficients,
            failed_voxels,
        })
    }
}

/// The fit state: per-voxel coefficient vectors on top of the model's
/// precomputed matrices. ODF evaluation never mutates it.
#[derive(Debug)]
pub struct ShoreCartFit<'a> {
    model: &'a ShoreCartModel,
    coefficients: ArrayD<f64>,
    failed_voxels: Vec<usize>,
}

impl ShoreCartFit<'_> {
    /// Coefficient volume: the input's leading axes plus one trailing axis
    /// aligned with [`ShoreCartModel::indices`].
    pub fn coefficients(&self) -> &ArrayD<f64> {
        &self.coefficients
    }

    /// Flat indices of voxels whose signal could not be fitted; their
    /// coefficient vectors are NaN.
    pub fn failed_voxels(&self) -> &[usize] {
        &self.failed_voxels
    }

    fn flat_coefficients(&self) -> ArrayView2<'_, f64> {
        let n_coef = self.model.indices.len();
        let n_voxels = self.coefficients.len() / n_coef;
        self.coefficients
            .view()
            .into_shape((n_voxels, n_coef))
            .expect("coefficient volume is contiguous")
    }

    fn with_trailing_axis(&self, flat: Array2<f64>, trailing: usize) -> ArrayD<f64> {
        let ndim = self.coefficients.ndim();
        let mut shape: Vec<usize> = self.coefficients.shape()[..ndim - 1].to_vec();
        shape.push(trailing);
        flat.into_shape(shape)
            .expect("per-voxel rows reshape to the voxel grid")
    }

    /// Re-predict the measured signal, `phi . c` per voxel, for residual
    /// inspection.
    pub fn fitted_signal(&self) -> ArrayD<f64> {
        let flat = self.flat_coefficients().dot(&self.model.phi.t());
        self.with_trailing_axis(flat, self.model.gtab.len())
    }

    /// Evaluate the ODF at the supplied unit `vertices` (one row per
    /// direction) for the radial moment `smoment`.
    ///
    /// The synthesis matrix is rebuilt per call, so different moments can be
    /// sampled from the same fitted coefficients. Failed voxels propagate as
    /// NaN rows.
    pub fn odf(
        &self,
        vertices: ArrayView2<'_, f64>,
        smoment: usize,
    ) -> Result<ArrayD<f64>, ShoreError> {
        if vertices.ncols() != 3 {
            return Err(ShoreError::InvalidConfiguration(format!(
                "sample directions must be rows of 3 components, got {}",
                vertices.ncols()
            )));
        }
        let mu = self.model.config.mu;
        let synthesis = odf_matrix(&self.model.indices, [mu; 3], vertices, smoment);
        let flat = self.flat_coefficients().dot(&synthesis.t());
        Ok(self.with_trailing_axis(flat, vertices.nrows()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{arr2, Array1, Array2, ArrayD, Axis, IxDyn};
    use ndarray_rand::rand_distr::{StandardNormal, Uniform};
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// b0 plus `dirs_per_shell` pseudo-random directions on each shell.
    fn synthetic_table(shells: &[f64], dirs_per_shell: usize, seed: u64) -> GradientTable {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = 1 + shells.len() * dirs_per_shell;
        let mut bvals = Array1::zeros(n);
        let mut bvecs = Array2::zeros((n, 3));
        let mut row = 1;
        for &b in shells {
            for _ in 0..dirs_per_shell {
                let v: Array1<f64> = Array1::random_using(3, StandardNormal, &mut rng);
                let norm = v.dot(&v).sqrt();
                for axis in 0..3 {
                    bvecs[[row, axis]] = v[axis] / norm;
                }
                bvals[row] = b;
                row += 1;
            }
        }
        GradientTable::new(bvals, bvecs).unwrap()
    }

    fn config(radial_order: usize, lambda: f64) -> ShoreCartConfig {
        ShoreCartConfig {
            radial_order,
            lambda,
            ..ShoreCartConfig::default()
        }
    }

    fn signal_from(phi: &Array2<f64>, coefficients: &Array1<f64>) -> ArrayD<f64> {
        phi.dot(coefficients).into_dyn()
    }

    #[test]
    fn unit_coefficient_round_trip_is_exact() {
        let gtab = synthetic_table(&[700.0, 2000.0], 8, 7);
        let model = ShoreCartModel::new(gtab, config(2, 0.0)).unwrap();
        let mut truth = Array1::zeros(model.indices().len());
        truth[0] = 1.0;
        let signal = signal_from(model.design_matrix(), &truth);
        let fit = model.fit(signal.view()).unwrap();
        assert!(fit.failed_voxels().is_empty());
        for (&got, &want) in fit.coefficients().iter().zip(truth.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-10);
        }
    }

    #[test]
    fn random_coefficient_round_trip_at_order_four() {
        let mut rng = StdRng::seed_from_u64(11);
        let gtab = synthetic_table(&[500.0, 1000.0, 2000.0], 16, 3);
        let model = ShoreCartModel::new(gtab, config(4, 0.0)).unwrap();
        let truth = Array1::random_using(model.indices().len(), Uniform::new(0.0, 1.0), &mut rng);
        let signal = signal_from(model.design_matrix(), &truth);
        let fit = model.fit(signal.view()).unwrap();
        for (&got, &want) in fit.coefficients().iter().zip(truth.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-4);
        }
    }

    #[test]
    fn lambda_zero_reduces_to_ordinary_least_squares() {
        let gtab = synthetic_table(&[700.0, 2000.0], 10, 19);
        let model = ShoreCartModel::new(gtab, config(2, 0.0)).unwrap();
        let phi = model.design_matrix();
        let mut rng = StdRng::seed_from_u64(23);
        let noisy: Array1<f64> =
            Array1::random_using(phi.nrows(), Uniform::new(0.1, 1.0), &mut rng);

        // Reference OLS solution straight from an SVD of the design matrix.
        let a = DMatrix::from_fn(phi.nrows(), phi.ncols(), |i, j| phi[[i, j]]);
        let b = DVector::from_iterator(noisy.len(), noisy.iter().copied());
        let reference = a.svd(true, true).solve(&b, 1e-12).unwrap();

        let fit = model.fit(noisy.into_dyn().view()).unwrap();
        for (&got, &want) in fit.coefficients().iter().zip(reference.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-8);
        }
    }

    #[test]
    fn regularization_trades_residual_for_smoothness() {
        let gtab = synthetic_table(&[700.0, 2000.0], 10, 41);
        let mut rng = StdRng::seed_from_u64(5);
        let noisy: Array1<f64> = Array1::random_using(gtab.len(), Uniform::new(0.1, 1.0), &mut rng);

        let mut residuals = Vec::new();
        let mut penalties = Vec::new();
        for &lambda in &[0.0, 1e-4, 1e-2, 1.0] {
            let model = ShoreCartModel::new(gtab.clone(), config(4, lambda)).unwrap();
            let fit = model.fit(noisy.clone().into_dyn().view()).unwrap();
            let coefficients = Array1::from_iter(fit.coefficients().iter().copied());
            // Same dimensionality at every lambda.
            assert_eq!(coefficients.len(), model.indices().len());
            let residual = &noisy - &model.design_matrix().dot(&coefficients);
            residuals.push(residual.dot(&residual));
            penalties.push(coefficients.dot(&model.regularization_matrix().dot(&coefficients)));
        }
        for window in residuals.windows(2) {
            assert!(window[1] >= window[0] * (1.0 - 1e-9));
        }
        for window in penalties.windows(2) {
            assert!(window[1] <= window[0] * (1.0 + 1e-9));
        }
    }

    #[test]
    fn volume_fit_preserves_spatial_axes() {
        let gtab = synthetic_table(&[700.0, 2000.0], 8, 13);
        let model = ShoreCartModel::new(gtab, config(2, 1e-8)).unwrap();
        let n = model.gradient_table().len();
        let mut rng = StdRng::seed_from_u64(2);
        let volume: ArrayD<f64> =
            ArrayD::random_using(IxDyn(&[3, 2, n]), Uniform::new(0.1, 1.0), &mut rng);

        let fit = model.fit(volume.view()).unwrap();
        assert_eq!(
            fit.coefficients().shape(),
            &[3, 2, model.indices().len()][..]
        );
        assert_eq!(fit.fitted_signal().shape(), &[3, 2, n][..]);

        let vertices = arr2(&[
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.577350269, 0.577350269, 0.577350269],
        ]);
        let odf = fit.odf(vertices.view(), 4).unwrap();
        assert_eq!(odf.shape(), &[3, 2, 4][..]);
        assert!(odf.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn non_finite_voxel_is_marked_and_others_survive() {
        let gtab = synthetic_table(&[700.0, 2000.0], 8, 29);
        let model = ShoreCartModel::new(gtab, config(2, 0.0)).unwrap();
        let mut truth = Array1::zeros(model.indices().len());
        truth[0] = 1.0;
        let clean = model.design_matrix().dot(&truth);

        let n = model.gradient_table().len();
        let mut volume = Array2::zeros((3, n));
        volume.row_mut(0).assign(&clean);
        volume.row_mut(1).fill(f64::NAN);
        volume.row_mut(2).assign(&clean);

        let fit = model.fit(volume.into_dyn().view()).unwrap();
        assert_eq!(fit.failed_voxels(), &[1]);
        let coefficients = fit.coefficients();
        assert_abs_diff_eq!(coefficients[[0, 0]], 1.0, epsilon = 1e-10);
        assert!(coefficients.index_axis(Axis(0), 1).iter().all(|v| v.is_nan()));
        assert_abs_diff_eq!(coefficients[[2, 0]], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn order_zero_fit_is_a_projection() {
        let gtab = synthetic_table(&[700.0], 6, 31);
        let model = ShoreCartModel::new(gtab, config(0, 0.0)).unwrap();
        assert_eq!(model.indices(), &[[0, 0, 0]]);

        let mut rng = StdRng::seed_from_u64(17);
        let signal: Array1<f64> =
            Array1::random_using(model.gradient_table().len(), Uniform::new(0.1, 1.0), &mut rng);
        let fit = model.fit(signal.clone().into_dyn().view()).unwrap();

        let column = model.design_matrix().column(0);
        let expected = column.dot(&signal) / column.dot(&column);
        assert_eq!(fit.coefficients().len(), 1);
        assert_relative_eq!(fit.coefficients()[[0]], expected, max_relative = 1e-12);
    }

    #[test]
    fn signal_length_mismatch_is_rejected_up_front() {
        let gtab = synthetic_table(&[700.0, 2000.0], 8, 3);
        let n = gtab.len();
        let model = ShoreCartModel::new(gtab, config(2, 0.0)).unwrap();
        let short = Array1::<f64>::zeros(n - 1).into_dyn();
        let err = model.fit(short.view()).err().expect("length mismatch must fail");
        assert_eq!(
            err,
            ShoreError::ShapeMismatch {
                expected: n,
                got: n - 1
            }
        );
    }

    #[test]
    fn underdetermined_system_without_regularization_is_singular() {
        // 2 samples cannot pin down the 22 order-4 basis functions.
        let gtab = synthetic_table(&[700.0], 1, 47);
        let result = ShoreCartModel::new(gtab, config(4, 0.0));
        assert!(matches!(result, Err(ShoreError::SingularSystem)));
    }

    #[test]
    fn negative_lambda_surfaces_as_singular_system() {
        let gtab = synthetic_table(&[700.0, 2000.0], 10, 53);
        let result = ShoreCartModel::new(gtab, config(2, -1e6));
        assert!(matches!(result, Err(ShoreError::SingularSystem)));
    }

    #[test]
    fn both_radial_moments_reuse_the_same_fit() {
        let gtab = synthetic_table(&[500.0, 1000.0, 2000.0], 16, 61);
        let model = ShoreCartModel::new(gtab, config(4, 1e-8)).unwrap();
        let mut rng = StdRng::seed_from_u64(67);
        let truth = Array1::random_using(model.indices().len(), Uniform::new(-0.5, 0.5), &mut rng);
        let signal = signal_from(model.design_matrix(), &truth);
        let fit = model.fit(signal.view()).unwrap();

        let vertices = arr2(&[[1.0, 0.0, 0.0], [0.0, 0.707106781, 0.707106781]]);
        let plain = fit.odf(vertices.view(), 0).unwrap();
        let sharpened = fit.odf(vertices.view(), 4).unwrap();
        assert!(plain.iter().all(|v| v.is_finite()));
        assert!(sharpened.iter().all(|v| v.is_finite()));
        // Different moments weight the radial profile differently.
        assert!((plain[[0]] - sharpened[[0]]).abs() > 1e-12);
    }

    #[test]
    fn cached_and_direct_construction_agree() {
        let cache = BasisCache::default();
        let gtab = synthetic_table(&[700.0, 2000.0], 8, 83);
        let direct = ShoreCartModel::new(gtab.clone(), config(2, 1e-8)).unwrap();
        let cached = ShoreCartModel::with_cache(gtab, config(2, 1e-8), &cache).unwrap();
        assert_eq!(direct.design_matrix(), cached.design_matrix());
        assert_eq!(direct.regularization_matrix(), cached.regularization_matrix());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn isotropic_coefficients_give_an_isotropic_odf() {
        let gtab = synthetic_table(&[700.0, 2000.0], 8, 71);
        let model = ShoreCartModel::new(gtab, config(2, 0.0)).unwrap();
        let mut truth = Array1::zeros(model.indices().len());
        truth[0] = 1.0;
        let signal = signal_from(model.design_matrix(), &truth);
        let fit = model.fit(signal.view()).unwrap();

        let vertices = arr2(&[
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.577350269, 0.577350269, 0.577350269],
        ]);
        let odf = fit.odf(vertices.view(), 0).unwrap();
        for d in 1..vertices.nrows() {
            assert_relative_eq!(odf[[d]], odf[[0]], max_relative = 1e-8);
        }
    }
}
