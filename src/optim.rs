//! First-order step optimizers for the weight vector.
//!
//! Every variant exposes the same capability through [`Step`]: given the
//! current weights and a gradient, return the next weights. Any running state
//! (velocity, squared-gradient averages, moment estimates) lives inside the
//! variant and persists across the steps of one fit.
//!
//! The weights are passed in on every step rather than cached by the
//! optimizer, so a projection applied by the caller between steps is seen by
//! the next update.

use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One update of a first-order method.
pub trait Step {
    /// Return the weights after one update with `grad`.
    fn step(&mut self, weights: &Array1<f64>, grad: &Array1<f64>) -> Array1<f64>;
}

/// Which update rule to use.
///
/// Parsed from the tags `"Adam"`, `"RMSProp"`, `"sgd_momentum"` and `"sgd"`.
/// Any other tag selects plain gradient descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OptimizerKind {
    Adam,
    RmsProp,
    SgdMomentum,
    #[default]
    Sgd,
}

impl OptimizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Adam => "Adam",
            OptimizerKind::RmsProp => "RMSProp",
            OptimizerKind::SgdMomentum => "sgd_momentum",
            OptimizerKind::Sgd => "sgd",
        }
    }

    fn from_tag(tag: &str) -> Self {
        match tag {
            "Adam" => OptimizerKind::Adam,
            "RMSProp" => OptimizerKind::RmsProp,
            "sgd_momentum" => OptimizerKind::SgdMomentum,
            _ => OptimizerKind::Sgd,
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl From<String> for OptimizerKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<OptimizerKind> for String {
    fn from(kind: OptimizerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain gradient descent: w - lr * g.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub lr: f64,
}

impl Step for Sgd {
    fn step(&mut self, weights: &Array1<f64>, grad: &Array1<f64>) -> Array1<f64> {
        weights - &(grad * self.lr)
    }
}

/// Gradient descent with heavy-ball momentum.
#[derive(Debug, Clone)]
pub struct SgdMomentum {
    pub lr: f64,
    /// Velocity decay.
    pub momentum: f64,
    velocity: Array1<f64>,
}

impl SgdMomentum {
    pub fn new(len: usize, lr: f64) -> Self {
        Self {
            lr,
            momentum: 0.9,
            velocity: Array1::zeros(len),
        }
    }
}

impl Step for SgdMomentum {
    fn step(&mut self, weights: &Array1<f64>, grad: &Array1<f64>) -> Array1<f64> {
        let (mu, lr) = (self.momentum, self.lr);
        Zip::from(&mut self.velocity)
            .and(grad)
            .for_each(|v, &g| *v = mu * *v + lr * g);
        weights - &self.velocity
    }
}

/// Gradient scaled by a running RMS of past gradients.
#[derive(Debug, Clone)]
pub struct RmsProp {
    pub lr: f64,
    /// Decay of the squared-gradient average.
    pub rho: f64,
    pub epsilon: f64,
    sq_avg: Array1<f64>,
}

impl RmsProp {
    pub fn new(len: usize, lr: f64) -> Self {
        Self {
            lr,
            rho: 0.9,
            epsilon: 1e-8,
            sq_avg: Array1::zeros(len),
        }
    }
}

impl Step for RmsProp {
    fn step(&mut self, weights: &Array1<f64>, grad: &Array1<f64>) -> Array1<f64> {
        let (rho, lr, eps) = (self.rho, self.lr, self.epsilon);
        let mut next = weights.clone();
        Zip::from(&mut next)
            .and(&mut self.sq_avg)
            .and(grad)
            .for_each(|w, s, &g| {
                *s = rho * *s + (1.0 - rho) * g * g;
                *w -= lr * g / (s.sqrt() + eps);
            });
        next
    }
}

/// Adam: bias-corrected first and second moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    m: Array1<f64>,
    v: Array1<f64>,
    t: i32,
}

impl Adam {
    pub fn new(len: usize, lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: Array1::zeros(len),
            v: Array1::zeros(len),
            t: 0,
        }
    }
}

impl Step for Adam {
    fn step(&mut self, weights: &Array1<f64>, grad: &Array1<f64>) -> Array1<f64> {
        self.t += 1;
        let (b1, b2, lr, eps) = (self.beta1, self.beta2, self.lr, self.epsilon);
        let bias1 = 1.0 - b1.powi(self.t);
        let bias2 = 1.0 - b2.powi(self.t);

        let mut next = weights.clone();
        Zip::from(&mut next)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(grad)
            .for_each(|w, m, v, &g| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *w -= lr * m_hat / (v_hat.sqrt() + eps);
            });
        next
    }
}

/// A step optimizer selected by [`OptimizerKind`].
#[derive(Debug, Clone)]
pub enum Optimizer {
    Sgd(Sgd),
    SgdMomentum(SgdMomentum),
    RmsProp(RmsProp),
    Adam(Adam),
}

impl Optimizer {
    /// Fresh optimizer state sized for `initial`.
    pub fn new(kind: OptimizerKind, initial: &Array1<f64>, lr: f64) -> Self {
        let len = initial.len();
        match kind {
            OptimizerKind::Adam => Optimizer::Adam(Adam::new(len, lr)),
            OptimizerKind::RmsProp => Optimizer::RmsProp(RmsProp::new(len, lr)),
            OptimizerKind::SgdMomentum => Optimizer::SgdMomentum(SgdMomentum::new(len, lr)),
            OptimizerKind::Sgd => Optimizer::Sgd(Sgd { lr }),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            Optimizer::Sgd(_) => OptimizerKind::Sgd,
            Optimizer::SgdMomentum(_) => OptimizerKind::SgdMomentum,
            Optimizer::RmsProp(_) => OptimizerKind::RmsProp,
            Optimizer::Adam(_) => OptimizerKind::Adam,
        }
    }
}

impl Step for Optimizer {
    fn step(&mut self, weights: &Array1<f64>, grad: &Array1<f64>) -> Array1<f64> {
        match self {
            Optimizer::Sgd(o) => o.step(weights, grad),
            Optimizer::SgdMomentum(o) => o.step(weights, grad),
            Optimizer::RmsProp(o) => o.step(weights, grad),
            Optimizer::Adam(o) => o.step(weights, grad),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const ALL: [OptimizerKind; 4] = [
        OptimizerKind::Adam,
        OptimizerKind::RmsProp,
        OptimizerKind::SgdMomentum,
        OptimizerKind::Sgd,
    ];

    #[test]
    fn test_kind_tags() {
        assert_eq!("Adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("RMSProp".parse::<OptimizerKind>().unwrap(), OptimizerKind::RmsProp);
        assert_eq!(
            "sgd_momentum".parse::<OptimizerKind>().unwrap(),
            OptimizerKind::SgdMomentum
        );
        assert_eq!("sgd".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        // Unknown tags fall back to plain descent.
        assert_eq!("adamw".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        for kind in ALL {
            assert_eq!(kind.to_string().parse::<OptimizerKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_factory_selects_variant() {
        let w = Array1::zeros(3);
        for kind in ALL {
            assert_eq!(Optimizer::new(kind, &w, 0.1).kind(), kind);
        }
    }

    #[test]
    fn test_sgd_step() {
        let mut opt = Sgd { lr: 0.5 };
        let next = opt.step(&array![1.0, 2.0], &array![2.0, -2.0]);
        assert_eq!(next, array![0.0, 3.0]);
    }

    #[test]
    fn test_momentum_accumulates() {
        let mut opt = SgdMomentum::new(1, 0.1);
        let w = array![0.0];
        let g = array![1.0];
        let w1 = opt.step(&w, &g);
        assert!((w1[0] + 0.1).abs() < 1e-12);
        // v = 0.9 * 0.1 + 0.1 = 0.19
        let w2 = opt.step(&w1, &g);
        assert!((w2[0] + 0.29).abs() < 1e-12, "w2 = {}", w2[0]);
    }

    #[test]
    fn test_adam_first_step_is_lr_sized() {
        // With bias correction the first Adam step is lr * sign(g).
        let mut opt = Adam::new(2, 0.01);
        let next = opt.step(&array![1.0, 1.0], &array![5.0, -0.2]);
        assert!((next[0] - 0.99).abs() < 1e-6);
        assert!((next[1] - 1.01).abs() < 1e-6);
    }

    #[test]
    fn test_rmsprop_first_step() {
        let mut opt = RmsProp::new(1, 0.01);
        // s = 0.1 * g^2, step = lr * g / sqrt(0.1 g^2) = lr / sqrt(0.1)
        let next = opt.step(&array![0.0], &array![3.0]);
        let expected = -0.01 / 0.1f64.sqrt();
        assert!((next[0] - expected).abs() < 1e-6, "next = {}", next[0]);
    }

    #[test]
    fn test_all_variants_descend_quadratic() {
        // f(w) = 0.5 * ||w - 1||^2, gradient w - 1.
        for kind in ALL {
            let mut w = array![4.0, -3.0];
            let mut opt = Optimizer::new(kind, &w, 0.01);
            for _ in 0..2000 {
                let g = w.mapv(|x| x - 1.0);
                w = opt.step(&w, &g);
            }
            for &x in w.iter() {
                assert!((x - 1.0).abs() < 0.1, "{kind}: x = {x}");
            }
        }
    }
}
