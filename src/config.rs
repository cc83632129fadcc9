//! Learner configuration.

use serde::{Deserialize, Serialize};

use crate::optim::OptimizerKind;
use crate::{Error, Result};

/// Hyperparameters of a [`BoundedLearner`](crate::learner::BoundedLearner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Double the reconstructed adjacency (A + A^T) in `normalize`.
    pub symmetric: bool,

    /// Step optimizer.
    pub optim: OptimizerKind,

    /// Step optimizer learning rate.
    pub lr_optim: f64,

    /// Weight of the per-step perturbation bound correction.
    pub bound: f64,

    /// Number of gradient steps in `fit`. No early stopping.
    pub epochs_pre: usize,

    /// Weight of the Laplacian fitting term.
    pub alpha: f64,

    /// Weight of the feature smoothness term.
    pub beta: f64,

    /// Per-iteration debug logging.
    pub debug: bool,

    /// Diagnostic losses are evaluated every this many epochs (epoch 0 included).
    pub diagnostics_every: usize,

    /// Bound-correction denominators with magnitude at or below this are
    /// treated as degenerate and that edge's correction is skipped.
    pub denominator_floor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symmetric: false,
            optim: OptimizerKind::Adam,
            lr_optim: 0.01,
            bound: 0.0,
            epochs_pre: 400,
            alpha: 1.0,
            beta: 1.0,
            debug: false,
            diagnostics_every: 20,
            denominator_floor: 1e-12,
        }
    }
}

impl Config {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.lr_optim.is_finite() && self.lr_optim > 0.0) {
            return Err(Error::Config(format!(
                "lr_optim must be finite and > 0, got {}",
                self.lr_optim
            )));
        }
        for (name, value) in [("bound", self.bound), ("alpha", self.alpha), ("beta", self.beta)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        if self.diagnostics_every == 0 {
            return Err(Error::Config("diagnostics_every must be >= 1".to_string()));
        }
        if self.denominator_floor.is_nan() || self.denominator_floor < 0.0 {
            return Err(Error::Config(format!(
                "denominator_floor must be >= 0, got {}",
                self.denominator_floor
            )));
        }
        Ok(())
    }

    /// Load from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("JSON parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
