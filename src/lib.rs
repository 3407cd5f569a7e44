//! Cartesian SHORE reconstruction of diffusion MRI orientation
//! distribution functions.
//!
//! The measured q-space signal of every voxel is expanded in the 3-D
//! Cartesian SHORE basis (separable Hermite functions) and the expansion
//! coefficients are recovered by a Laplacian-regularized least-squares
//! solve. The fitted coefficients then give the ODF at any set of unit
//! directions through the Fourier-domain dual basis, in closed form.
//!
//! ```no_run
//! use ndarray::{Array1, Array2, ArrayD};
//! use shore_cart::{GradientTable, ShoreCartConfig, ShoreCartModel};
//!
//! # fn main() -> Result<(), shore_cart::ShoreError> {
//! # let (bvals, bvecs): (Array1<f64>, Array2<f64>) = unimplemented!();
//! # let (volume, vertices): (ArrayD<f64>, Array2<f64>) = unimplemented!();
//! let gtab = GradientTable::new(bvals, bvecs)?;
//! let config = ShoreCartConfig {
//!     radial_order: 6,
//!     lambda: 1e-8,
//!     ..ShoreCartConfig::default()
//! };
//! let model = ShoreCartModel::new(gtab, config)?;
//! let fit = model.fit(volume.view())?;
//! let odf = fit.odf(vertices.view(), 4)?;
//! # let _ = odf;
//! # Ok(())
//! # }
//! ```
//!
//! Everything the model precomputes is immutable and shared read-only, so
//! voxels are fitted in parallel and models can be reused across volumes
//! acquired with the same gradient table.

pub mod basis;
pub mod cache;
pub mod design;
pub mod error;
pub mod gradient;
pub mod laplace;
pub mod model;
pub mod odf;

pub use basis::{index_set, index_set_len, phi_1d, phi_3d, psi_1d, psi_3d, BasisIndex};
pub use cache::BasisCache;
pub use design::phi_matrix;
pub use error::ShoreError;
pub use gradient::GradientTable;
pub use laplace::{laplace_delta, laplace_l, laplace_r, laplace_reg_matrix, laplace_s};
pub use model::{ShoreCartConfig, ShoreCartFit, ShoreCartModel};
pub use odf::odf_matrix;
