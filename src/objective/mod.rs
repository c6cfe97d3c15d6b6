//! # Objective Module
//!
//! Training objectives consumed by an external optimizer.
//!
//! ## Contract
//! The optimizer repeatedly calls [`Objective::evaluate`] with a fresh
//! parameter vector and receives a value and a gradient. Objectives keep no
//! parameter history between calls; the only retained state is the sample
//! buffer (and, for persistent chains, the chain positions stored in it).
//!
//! ## Value
//! Contrastive divergence has no tractable log-likelihood. The value returned
//! is a proxy, tagged with [`ValueKind::MismatchProxy`]:
//!
//! ```text
//! mismatch = neff * ½ Σ (f_data - f_sample)²     over single and pair tables
//! value    = mismatch + regularization penalty
//! ```
//!
//! ## Gradient
//! The gradient is that of the quantity a minimizer should decrease, the
//! regularized negative log-likelihood:
//!
//! ```text
//! g = neff * (f_sample - f_data) + g_reg
//! ```
//! i.e. the negated, effective-count-scaled CD estimate `f_data - f_sample`
//! plus the regularization gradient.

pub mod cd;
pub mod tree;

pub use cd::{CdConfig, ContrastiveDivergence};
pub use tree::TreeContrastiveDivergence;

use crate::error::Result;

/// Meaning of [`Evaluation::value`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// Frequency-mismatch proxy plus penalty, not a log-likelihood
    MismatchProxy,
}

/// Scalar parts of one evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectiveValue {
    pub value: f64,
    pub kind: ValueKind,
    pub penalty: f64,
    pub mismatch: f64,
}

/// Result of one evaluation
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub kind: ValueKind,
    /// Regularization penalty included in `value`
    pub penalty: f64,
    /// Frequency mismatch included in `value`
    pub mismatch: f64,
    pub gradient: Vec<f64>,
}

/// A differentiable objective driven by an external optimizer.
///
/// Evaluations mutate internal sample buffers and must not overlap on one
/// instance.
pub trait Objective {
    /// Length of the parameter vector
    fn n_params(&self) -> usize;

    /// Evaluate at `x`, writing the gradient into `gradient`
    fn evaluate_into(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<ObjectiveValue>;

    /// Evaluate at `x`, returning value and gradient
    fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation> {
        let mut gradient = vec![0.0; self.n_params()];
        let v = self.evaluate_into(x, &mut gradient)?;
        Ok(Evaluation {
            value: v.value,
            kind: v.kind,
            penalty: v.penalty,
            mismatch: v.mismatch,
            gradient,
        })
    }
}
