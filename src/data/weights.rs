//! # Sequence Weights
//!
//! Per-sequence weights that down-weight redundant sequences when computing
//! the observed sufficient statistics.

use rayon::prelude::*;

use crate::data::alignment::Alignment;
use crate::error::{PottsError, Result};

/// Default identity threshold for redundancy reweighting
pub const DEFAULT_IDENTITY_THRESHOLD: f64 = 0.8;

/// Non-negative weights, one per alignment row.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceWeights {
    weights: Vec<f64>,
}

impl SequenceWeights {
    /// Wrap explicit weights. Every entry must be finite and non-negative
    /// and at least one must be positive.
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if let Some((i, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(PottsError::invalid_data(format!(
                "sequence weight {} is {}, expected a finite non-negative value",
                i, w
            )));
        }
        if !weights.iter().any(|&w| w > 0.0) {
            return Err(PottsError::invalid_data("all sequence weights are zero"));
        }
        Ok(Self { weights })
    }

    /// Weight 1 for each of `n` sequences
    pub fn uniform(n: usize) -> Self {
        Self {
            weights: vec![1.0; n],
        }
    }

    /// Reweight by sequence identity.
    ///
    /// Each sequence receives `1 / m` where `m` counts the sequences (itself
    /// included) sharing more than `threshold` of their columns with it.
    pub fn by_identity(msa: &Alignment, threshold: f64) -> Self {
        let n_cols = msa.n_cols() as f64;
        let weights = (0..msa.n_rows())
            .into_par_iter()
            .map(|i| {
                let row_i = msa.row(i);
                let neighbours = msa
                    .rows()
                    .filter(|row_j| {
                        let same = row_i.iter().zip(row_j.iter()).filter(|(a, b)| a == b).count();
                        same as f64 / n_cols > threshold
                    })
                    .count();
                1.0 / neighbours.max(1) as f64
            })
            .collect();
        Self { weights }
    }

    /// Number of weights
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Effective number of sequences (sum of weights)
    pub fn neff(&self) -> f64 {
        self.weights.iter().sum()
    }

    #[inline]
    pub fn get(&self, row: usize) -> f64 {
        self.weights[row]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Check that the weights pair 1:1 with the alignment rows
    pub fn check_rows(&self, msa: &Alignment) -> Result<()> {
        if self.len() != msa.n_rows() {
            return Err(PottsError::invalid_data(format!(
                "{} sequence weights for an alignment of {} rows",
                self.len(),
                msa.n_rows()
            )));
        }
        Ok(())
    }
}
