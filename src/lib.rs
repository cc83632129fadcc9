//! # rwl
//!
//! Bounded two-stage graph structure learning: denoise a graph's Laplacian
//! while smoothing node features, then hand a normalized adjacency to a
//! downstream graph neural network.
//!
//! ## The Core Idea
//!
//! An undirected, self-loop-free graph on n nodes is a point in the
//! non-negative orthant of R^k, k = n(n-1)/2: the strict upper triangle of its
//! adjacency matrix. Optimizing over that weight vector w keeps every iterate
//! a valid graph (symmetric, zero diagonal) for free, and the projection onto
//! the feasible set is a plain clamp at zero.
//!
//! ## Key Functions
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`vech`] | w ↔ A and w ↔ L transforms, and the adjoint `L*` |
//! | [`objective`] | fixed linear term, bound correction, gradient, diagnostics |
//! | [`optim`] | SGD, momentum, RMSProp, Adam behind one [`optim::Step`] trait |
//! | [`learner::BoundedLearner`] | the projected-gradient fit loop |
//! | [`smoothing`] | Dirichlet energy and D^{-1/2} M D^{-1/2} normalization |
//!
//! ## Quick Start
//!
//! ```rust
//! use rwl::config::Config;
//! use rwl::learner::BoundedLearner;
//! use ndarray::array;
//!
//! let adj = array![
//!     [0.0, 1.0, 1.0, 0.0],
//!     [1.0, 0.0, 1.0, 0.0],
//!     [1.0, 1.0, 0.0, 1.0],
//!     [0.0, 0.0, 1.0, 0.0]
//! ];
//! let features = array![[1.0, 0.0], [0.9, 0.1], [0.6, 0.4], [0.0, 1.0]];
//!
//! let cfg = Config { epochs_pre: 50, bound: 0.05, ..Config::default() };
//! let mut learner = BoundedLearner::new((), cfg).unwrap();
//!
//! let cleaned = learner.fit(&features, &adj).unwrap();
//! assert!(cleaned.iter().all(|&a| a >= 0.0));
//!
//! // Self-loop-augmented, degree-normalized adjacency for the GNN.
//! let a_hat = learner.normalize(None).unwrap();
//! assert_eq!(a_hat.dim(), (4, 4));
//! ```
//!
//! ## The Fit Loop
//!
//! ```text
//! L_noise = D - (A + A^T)/2
//! w       = -triu(L_noise)           c = L*(2 alpha L_noise - beta X X^T)
//! repeat epochs_pre times:
//!     grad  = L*(alpha L(w)) - c + bound_correction(w, w_old)
//!     w_old = w
//!     w     = max(0, step(w, grad))
//! return A(w)
//! ```
//!
//! ## What Can Go Wrong
//!
//! 1. **Non-triangular weight length**: there is no n with n(n-1)/2 = k;
//!    every transform returns [`Error::InvalidParameterization`].
//! 2. **Degenerate bound denominator**: `||A(w)||^2 - w_old w` can vanish,
//!    e.g. for an empty graph. Those edges get no correction that epoch.
//! 3. **Divergence**: a learning rate too large for the graph makes the
//!    weights blow up; the fit stops with [`Error::NumericalInstability`].
//! 4. **Zero degree nodes**: D^{-1/2} is taken as 0, never infinity.
//! 5. **Scaling**: O(n²) storage and O(n² d) work per step. Dense only.
//!
//! ## References
//!
//! - Kumar, Ying, Cardoso, Palomar (2020). "A Unified Framework for Structured
//!   Graph Learning via Spectral Constraints"
//! - Runwal, Vivek, Kumar (2022). "Robustifying GNN Via Weighted Laplacian"

use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

pub mod config;
pub mod learner;
pub mod objective;
pub mod optim;
pub mod smoothing;
pub mod vech;

#[derive(Debug, Error)]
pub enum Error {
    #[error("matrix is not square: {0} x {1}")]
    NotSquare(usize, usize),

    #[error("weight vector length {len} is not a triangular number n(n-1)/2")]
    InvalidParameterization { len: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("graph has no nodes")]
    EmptyGraph,

    #[error("non-finite weights after step at epoch {epoch}")]
    NumericalInstability { epoch: usize },

    #[error("learner has not been fitted")]
    NotFitted,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn ensure_square(a: &Array2<f64>) -> Result<usize> {
    let (n, m) = a.dim();
    if n != m {
        return Err(Error::NotSquare(n, m));
    }
    Ok(n)
}

/// Compute degree vector from adjacency matrix.
pub fn degree_vector(adj: &Array2<f64>) -> Array1<f64> {
    adj.sum_axis(Axis(1))
}

/// Unnormalized Laplacian: L = D - A
///
/// # Properties
///
/// - Symmetric positive semidefinite (for symmetric non-negative A)
/// - Rows sum to zero
/// - x^T L x = (1/2) Σ_{ij} A_{ij} (x_i - x_j)² (quadratic form)
///
/// # Example
///
/// ```rust
/// use rwl::adjacency_to_laplacian;
/// use ndarray::array;
///
/// let adj = array![[0.0, 1.0], [1.0, 0.0]];
/// let lap = adjacency_to_laplacian(&adj);
/// assert!((lap[[0,0]] - 1.0).abs() < 1e-10);  // degree
/// assert!((lap[[0,1]] + 1.0).abs() < 1e-10);  // -adjacency
/// ```
pub fn adjacency_to_laplacian(adj: &Array2<f64>) -> Array2<f64> {
    let mut lap = -adj;
    for (i, d) in degree_vector(adj).iter().enumerate() {
        lap[[i, i]] += d;
    }
    lap
}

/// Symmetric part (A + A^T) / 2.
///
/// A directed edge of weight w becomes an undirected edge of weight w/2.
pub fn symmetrize(adj: &Array2<f64>) -> Array2<f64> {
    (adj + &adj.t()) * 0.5
}

/// D^{-1/2} as a vector: (d_i + eps)^{-1/2}.
///
/// A degree of exactly zero maps to 0, and so does anything whose inverse
/// root is not finite (negative degrees).
pub fn inv_sqrt_degrees(degrees: &Array1<f64>, eps: f64) -> Array1<f64> {
    degrees.mapv(|d| {
        if d == 0.0 {
            return 0.0;
        }
        let r = (d + eps).powf(-0.5);
        if r.is_finite() {
            r
        } else {
            0.0
        }
    })
}
