//! Bounded two-stage structure learner.
//!
//! Stage one (`fit`) denoises the graph: starting from the weights encoded by
//! the observed Laplacian, it runs a fixed number of projected gradient steps
//!
//! ```text
//! for epoch in 0..epochs_pre:
//!     corr   = bound_correction(w, w_old)
//!     grad   = L*(alpha L(w)) - c + corr
//!     w_old  = w
//!     w      = max(0, step(w, grad))
//! ```
//!
//! and returns A(w). Stage two belongs to the downstream model, which consumes
//! the self-loop-augmented, degree-normalized adjacency from
//! [`BoundedLearner::normalize`].

use std::time::Instant;

use ndarray::{Array1, Array2};

use crate::config::Config;
use crate::objective::{
    bound_correction, diagnostics, gradient, linear_term, DiagnosticInputs, Diagnostics,
};
use crate::optim::{Optimizer, Step};
use crate::smoothing::normalize_adjacency;
use crate::vech::{adjacency_from_weights, laplacian_to_weights};
use crate::{adjacency_to_laplacian, ensure_square, symmetrize, Error, Result};

/// Where a learner is in its fit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Iterating { epoch: usize },
    Done,
}

/// Mutable state threaded through the fit loop.
#[derive(Debug, Clone)]
pub struct FitState {
    /// Current weights. Non-negative after every step.
    pub weights: Array1<f64>,
    /// Weights before the latest step.
    pub previous_weights: Array1<f64>,
    pub optimizer: Optimizer,
}

impl FitState {
    /// Start from `weights` with a zero previous snapshot.
    pub fn new(weights: Array1<f64>, config: &Config) -> Self {
        let optimizer = Optimizer::new(config.optim, &weights, config.lr_optim);
        Self {
            previous_weights: Array1::zeros(weights.len()),
            weights,
            optimizer,
        }
    }

    /// One projected gradient step. Returns the gradient that was applied.
    ///
    /// Fails with [`Error::NumericalInstability`] if the step produced a
    /// non-finite weight.
    pub fn step(
        &mut self,
        epoch: usize,
        c: &Array1<f64>,
        correction: &Array1<f64>,
        alpha: f64,
    ) -> Result<Array1<f64>> {
        let grad = gradient(&self.weights, c, correction, alpha)?;
        let next = self.optimizer.step(&self.weights, &grad);

        // f64::max would silently map NaN to 0, so check before projecting.
        if next.iter().any(|w| !w.is_finite()) {
            return Err(Error::NumericalInstability { epoch });
        }

        self.previous_weights = std::mem::replace(&mut self.weights, next);
        self.weights.mapv_inplace(|w| w.max(0.0));
        Ok(grad)
    }
}

/// Graph structure learner with a per-step perturbation bound.
///
/// `M` is the downstream model handle. The learner never calls it; it is kept
/// so the pair can be passed around together.
#[derive(Debug)]
pub struct BoundedLearner<M = ()> {
    backbone: M,
    config: Config,
    phase: Phase,
    weights: Option<Array1<f64>>,
    history: Vec<Diagnostics>,
    epochs_completed: usize,
}

impl<M> BoundedLearner<M> {
    pub fn new(backbone: M, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backbone,
            config,
            phase: Phase::Initializing,
            weights: None,
            history: Vec::new(),
            epochs_completed: 0,
        })
    }

    pub fn backbone(&self) -> &M {
        &self.backbone
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Learned weights of the last successful fit.
    pub fn weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    /// Diagnostics recorded during the last fit.
    pub fn history(&self) -> &[Diagnostics] {
        &self.history
    }

    /// Gradient steps taken by the last fit.
    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    /// Learn a cleaned adjacency from noisy `adj` and node `features` (n × d).
    ///
    /// `adj` is symmetrized as (A + A^T) / 2 first. Exactly `epochs_pre` steps
    /// are taken. The result is symmetric with a zero diagonal and
    /// non-negative entries.
    pub fn fit(&mut self, features: &Array2<f64>, adj: &Array2<f64>) -> Result<Array2<f64>> {
        let n = ensure_square(adj)?;
        if n == 0 {
            return Err(Error::EmptyGraph);
        }
        if features.nrows() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                got: features.nrows(),
            });
        }

        let cfg = self.config.clone();
        log::info!(
            "bounded two-stage fit: n={}, d={}, optim={}, lr={}, bound={}, epochs={}",
            n,
            features.ncols(),
            cfg.optim,
            cfg.lr_optim,
            cfg.bound,
            cfg.epochs_pre
        );

        self.reset();

        let adj = symmetrize(adj);
        let l_noise = adjacency_to_laplacian(&adj);
        let c = linear_term(&l_noise, features, cfg.alpha, cfg.beta)?;
        let mut state = FitState::new(laplacian_to_weights(&l_noise)?, &cfg);

        let inputs = DiagnosticInputs {
            l_noise: &l_noise,
            features,
            alpha: cfg.alpha,
            beta: cfg.beta,
            bound: cfg.bound,
        };

        let t_total = Instant::now();
        let last_correction = match self.run_epochs(&cfg, &mut state, &c, &inputs) {
            Ok(corr) => corr,
            Err(e) => {
                log::warn!("fit aborted after {} epochs: {}", self.epochs_completed, e);
                self.reset();
                return Err(e);
            }
        };

        log::info!(
            "optimization finished in {:.4}s, correction sum = {:.6e}",
            t_total.elapsed().as_secs_f64(),
            last_correction.sum()
        );

        let learned = adjacency_from_weights(&state.weights)?;
        self.weights = Some(state.weights);
        self.phase = Phase::Done;
        Ok(learned)
    }

    fn reset(&mut self) {
        self.phase = Phase::Initializing;
        self.weights = None;
        self.history.clear();
        self.epochs_completed = 0;
    }

    /// Runs every epoch on `state`. Returns the last bound correction applied.
    fn run_epochs(
        &mut self,
        cfg: &Config,
        state: &mut FitState,
        c: &Array1<f64>,
        inputs: &DiagnosticInputs<'_>,
    ) -> Result<Array1<f64>> {
        let mut last_correction = Array1::zeros(state.weights.len());

        for epoch in 0..cfg.epochs_pre {
            self.phase = Phase::Iterating { epoch };

            let correction = bound_correction(
                &state.weights,
                &state.previous_weights,
                cfg.bound,
                cfg.denominator_floor,
            )?;
            if correction.degenerate > 0 {
                log::warn!(
                    "epoch {}: {} degenerate bound denominators, correction skipped on those edges",
                    epoch,
                    correction.degenerate
                );
            }

            let grad = state.step(epoch, c, &correction.term, cfg.alpha)?;
            self.epochs_completed += 1;

            if cfg.debug {
                let grad_norm = grad.dot(&grad).sqrt();
                log::debug!("epoch {}: |grad| = {:.6e}", epoch, grad_norm);
            }

            if epoch % cfg.diagnostics_every == 0 {
                let diag = diagnostics(epoch, &state.weights, &state.previous_weights, inputs)?;
                log::info!(
                    "epoch {}: total loss = {:.6} (fit {:.6}, smooth {:.6}), bound loss = {:.6}",
                    epoch,
                    diag.total_loss(),
                    diag.fit_loss,
                    diag.smoothness_loss,
                    diag.bound_loss
                );
                self.history.push(diag);
            }

            last_correction = correction.term;
        }

        Ok(last_correction)
    }

    /// Self-loop-augmented, degree-normalized adjacency D^{-1/2}(A + I)D^{-1/2}.
    ///
    /// Uses `w` when given, otherwise the weights of the last fit. In
    /// `symmetric` mode A is replaced by A + A^T (i.e. 2A) before the self
    /// loops are added, for both sources of weights.
    ///
    /// Once fitted, a supplied `w` must describe a graph of the fitted size.
    pub fn normalize(&self, w: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        let w = match (w, self.weights.as_ref()) {
            (Some(w), Some(fitted)) if w.len() != fitted.len() => {
                return Err(Error::DimensionMismatch {
                    expected: fitted.len(),
                    got: w.len(),
                });
            }
            (Some(w), _) => w,
            (None, fitted) => fitted.ok_or(Error::NotFitted)?,
        };
        let mut adj = adjacency_from_weights(w)?;
        if self.config.symmetric {
            adj = &adj + &adj.t();
        }
        let n = adj.nrows();
        adj += &Array2::<f64>::eye(n);
        normalize_adjacency(&adj)
    }
}
