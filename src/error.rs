use thiserror::Error;

/// Errors surfaced while configuring or running a Cartesian SHORE fit.
///
/// Every condition here is detected eagerly, at model construction or at the
/// start of a `fit` call. Per-voxel data problems are never reported through
/// this type; they surface as failure markers on the fit result so a bulk fit
/// keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShoreError {
    /// The model cannot be built from the supplied inputs.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An array does not line up with the configured gradient table.
    #[error("signal has {got} samples along its trailing axis but the gradient table has {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    /// The regularized normal matrix `phi^T phi + lambda R` is not positive
    /// definite, so the Cholesky solve cannot proceed. Happens for negative
    /// lambda, or for lambda = 0 with fewer independent gradient directions
    /// than basis functions.
    #[error("regularized normal matrix is not positive definite; check lambda and the gradient scheme")]
    SingularSystem,
}
