//! Objective terms and the hand-derived gradient over the weight vector.
//!
//! The learned graph trades off three pulls:
//!
//! ```text
//! alpha  quadratic fit of L(w) against the observed Laplacian L_noise
//! beta   tr(X^T L(w) X), features smooth over heavy edges
//! bound  correction limiting how far one step moves A(w)
//! ```
//!
//! Only the first two terms are differentiated through `L*`. Their linear part
//! does not depend on w and is computed once per fit ([`linear_term`]); the
//! bound correction is recomputed every iteration from the current and
//! previous weights ([`bound_correction`]).

use crate::smoothing::feature_smoothing;
use crate::vech::{adjacency_from_weights, laplacian_adjoint, laplacian_from_weights};
use crate::{ensure_square, Error, Result};
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};

/// Fixed linear term c = L*(2 alpha L_noise - beta X X^T).
pub fn linear_term(
    l_noise: &Array2<f64>,
    features: &Array2<f64>,
    alpha: f64,
    beta: f64,
) -> Result<Array1<f64>> {
    let n = ensure_square(l_noise)?;
    if features.nrows() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: features.nrows(),
        });
    }
    let gram = features.dot(&features.t());
    let m = l_noise * (2.0 * alpha) - gram * beta;
    laplacian_adjoint(&m)
}

/// Per-iteration bound correction.
#[derive(Debug, Clone)]
pub struct BoundCorrection {
    pub term: Array1<f64>,
    /// Edges whose denominator fell under the floor and got no correction.
    pub degenerate: usize,
}

/// Bound correction for the current weights `w` given the previous weights.
///
/// Per edge e:
///
/// ```text
/// term[e] = bound * (2 w[e] - w_old[e]) / (||A(w)||_F^2 - w_old[e] * w[e])
/// ```
///
/// `2 w` is A*(A(w)), the adjacency adjoint applied to the current adjacency.
/// When a denominator is not finite or its magnitude is at most `floor`, that
/// edge's correction is set to 0 for this iteration.
pub fn bound_correction(
    w: &Array1<f64>,
    w_old: &Array1<f64>,
    bound: f64,
    floor: f64,
) -> Result<BoundCorrection> {
    if w_old.len() != w.len() {
        return Err(Error::DimensionMismatch {
            expected: w.len(),
            got: w_old.len(),
        });
    }
    let aw = adjacency_from_weights(w)?;
    let sq_norm = aw.iter().map(|x| x * x).sum::<f64>();

    let mut degenerate = 0;
    let mut term = Array1::zeros(w.len());
    Zip::from(&mut term)
        .and(w)
        .and(w_old)
        .for_each(|t, &wi, &wo| {
            let denom = sq_norm - wo * wi;
            if !denom.is_finite() || denom.abs() <= floor {
                degenerate += 1;
                *t = 0.0;
            } else {
                *t = bound * (2.0 * wi - wo) / denom;
            }
        });

    Ok(BoundCorrection { term, degenerate })
}

/// Gradient: L*(alpha L(w)) - c + correction.
pub fn gradient(
    w: &Array1<f64>,
    c: &Array1<f64>,
    correction: &Array1<f64>,
    alpha: f64,
) -> Result<Array1<f64>> {
    let lw = laplacian_from_weights(w)?;
    let mut grad = laplacian_adjoint(&(lw * alpha))?;
    grad -= c;
    grad += correction;
    Ok(grad)
}

/// Observational losses reported during a fit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub epoch: usize,
    /// alpha * ||L(w) - L_noise||_F
    pub fit_loss: f64,
    /// beta * tr(X^T L_sym X)
    pub smoothness_loss: f64,
    /// bound^2 * ln(sqrt(d) * ||A(w) - A(w_old)||_F^2)
    pub bound_loss: f64,
}

impl Diagnostics {
    pub fn total_loss(&self) -> f64 {
        self.fit_loss + self.smoothness_loss
    }
}

/// Inputs shared by every diagnostic evaluation of one fit.
pub struct DiagnosticInputs<'a> {
    pub l_noise: &'a Array2<f64>,
    pub features: &'a Array2<f64>,
    pub alpha: f64,
    pub beta: f64,
    pub bound: f64,
}

/// Evaluate the diagnostic losses at `w`, with `w_old` the weights before the
/// latest step.
///
/// The bound loss is `-inf` when the step did not move the weights at all.
pub fn diagnostics(
    epoch: usize,
    w: &Array1<f64>,
    w_old: &Array1<f64>,
    inputs: &DiagnosticInputs<'_>,
) -> Result<Diagnostics> {
    let lw = laplacian_from_weights(w)?;
    let fit_loss = inputs.alpha * frobenius_norm(&(lw - inputs.l_noise));

    let aw = adjacency_from_weights(w)?;
    let smoothness_loss = inputs.beta * feature_smoothing(&aw, inputs.features)?;

    let diff = aw - adjacency_from_weights(w_old)?;
    let d = inputs.features.ncols() as f64;
    let step_sq = diff.iter().map(|x| x * x).sum::<f64>();
    let bound_loss = inputs.bound.powi(2) * (d.sqrt() * step_sq).ln();

    Ok(Diagnostics {
        epoch,
        fit_loss,
        smoothness_loss,
        bound_loss,
    })
}

fn frobenius_norm(m: &Array2<f64>) -> f64 {
    m.iter().map(|x| x * x).sum::<f64>().sqrt()
}
