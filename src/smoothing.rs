//! Feature smoothness and symmetric degree normalization.
//!
//! Both routines scale by D^{-1/2}. A node whose degree is exactly zero gets
//! a scale of 0 rather than an infinite one, so isolated nodes contribute
//! nothing instead of poisoning the result with NaN.

use crate::{ensure_square, inv_sqrt_degrees, symmetrize, Error, Result};
use ndarray::Array2;

/// Degree offset used by [`feature_smoothing`] before taking D^{-1/2}.
pub const SMOOTHING_EPS: f64 = 1e-3;

/// Dirichlet energy of `features` over the graph `adj`.
///
/// The adjacency is symmetrized, then
///
/// ```text
/// L_sym = D^{-1/2} (D - A) D^{-1/2}      D_ii^{-1/2} = (d_i + 1e-3)^{-1/2}, or 0 if d_i = 0
/// E     = tr(X^T L_sym X)
/// ```
///
/// Lower values mean the features vary less across heavy edges.
///
/// # Example
///
/// ```rust
/// use rwl::smoothing::feature_smoothing;
/// use ndarray::array;
///
/// let adj = array![[0.0, 1.0], [1.0, 0.0]];
/// let same = array![[1.0], [1.0]];
/// let apart = array![[1.0], [-1.0]];
/// assert!(feature_smoothing(&adj, &same).unwrap().abs() < 1e-12);
/// assert!(feature_smoothing(&adj, &apart).unwrap() > 1.0);
/// ```
pub fn feature_smoothing(adj: &Array2<f64>, features: &Array2<f64>) -> Result<f64> {
    let n = ensure_square(adj)?;
    if features.nrows() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: features.nrows(),
        });
    }

    let adj = symmetrize(adj);
    let lap = crate::adjacency_to_laplacian(&adj);
    let r_inv = inv_sqrt_degrees(&crate::degree_vector(&adj), SMOOTHING_EPS);

    // D^{-1/2} L D^{-1/2} without materializing the diagonal matrices.
    let mut l_sym = lap;
    for ((i, j), v) in l_sym.indexed_iter_mut() {
        *v *= r_inv[i] * r_inv[j];
    }

    let xtlx = features.t().dot(&l_sym).dot(features);
    Ok(xtlx.diag().sum())
}

/// Symmetric degree normalization D^{-1/2} M D^{-1/2}, with D = diag(rowsum(M)).
///
/// Rows with zero (or negative) sum are scaled by 0.
pub fn normalize_adjacency(mx: &Array2<f64>) -> Result<Array2<f64>> {
    ensure_square(mx)?;
    let r_inv = inv_sqrt_degrees(&crate::degree_vector(mx), 0.0);
    let mut out = mx.clone();
    for ((i, j), v) in out.indexed_iter_mut() {
        *v *= r_inv[i] * r_inv[j];
    }
    Ok(out)
}
