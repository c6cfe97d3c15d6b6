//! # Model Parameters
//!
//! ## Role
//! Index arithmetic for the flattened parameter vector and conversion from
//! the raw (I/O) layout.
//!
//! ## Raw Layout
//! Raw parameter sources store pair potentials with axes `(i, a, j, b)`.
//! Flattening swaps the middle two axes so the vector follows the
//! `w[i,j,a,b]` convention used everywhere else.

use serde::{Deserialize, Serialize};

use crate::error::{PottsError, Result};

/// Shape of a flattened Potts parameter vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterLayout {
    pub n_cols: usize,
    pub n_states: usize,
}

impl ParameterLayout {
    pub fn new(n_cols: usize, n_states: usize) -> Self {
        Self { n_cols, n_states }
    }

    /// Length of the single-site block `L * S`
    #[inline]
    pub fn single_len(&self) -> usize {
        self.n_cols * self.n_states
    }

    /// Length of the pair block `L * L * S * S`
    #[inline]
    pub fn pair_len(&self) -> usize {
        self.single_len() * self.single_len()
    }

    /// Total length of the flattened vector
    #[inline]
    pub fn len(&self) -> usize {
        self.single_len() + self.pair_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of `v[i,a]` inside the single block
    #[inline]
    pub fn single_index(&self, i: usize, a: usize) -> usize {
        i * self.n_states + a
    }

    /// Offset of `w[i,j,a,b]` inside the pair block
    #[inline]
    pub fn pair_index(&self, i: usize, j: usize, a: usize, b: usize) -> usize {
        ((i * self.n_cols + j) * self.n_states + a) * self.n_states + b
    }

    /// Offset of the `S x S` block `w[i,j,.,.]` inside the pair block
    #[inline]
    pub fn pair_block(&self, i: usize, j: usize) -> usize {
        (i * self.n_cols + j) * self.n_states * self.n_states
    }

    /// Ensure `x` has exactly the length this layout requires
    pub fn check(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.len() {
            return Err(PottsError::shape(format!(
                "parameter vector has {} entries, expected {} for {} columns and {} states",
                x.len(),
                self.len(),
                self.n_cols,
                self.n_states
            )));
        }
        Ok(())
    }

    /// Split `x` into its single and pair blocks
    pub fn split<'a>(&self, x: &'a [f64]) -> (&'a [f64], &'a [f64]) {
        x.split_at(self.single_len())
    }

    /// Split a mutable vector into its single and pair blocks
    pub fn split_mut<'a>(&self, x: &'a mut [f64]) -> (&'a mut [f64], &'a mut [f64]) {
        x.split_at_mut(self.single_len())
    }

    /// Largest deviation from `w[i,j,a,b] == w[j,i,b,a]` in a pair block
    pub fn pair_asymmetry(&self, pair: &[f64]) -> f64 {
        let (l, s) = (self.n_cols, self.n_states);
        let mut worst = 0.0f64;
        for i in 0..l {
            for j in i..l {
                for a in 0..s {
                    for b in 0..s {
                        let d = (pair[self.pair_index(i, j, a, b)] - pair[self.pair_index(j, i, b, a)]).abs();
                        worst = worst.max(d);
                    }
                }
            }
        }
        worst
    }
}

/// Parameters as delivered by a raw-parameter source.
#[derive(Clone, Debug, PartialEq)]
pub struct RawParameters {
    pub n_cols: usize,
    pub n_states: usize,
    /// `L x S`, row-major
    pub x_single: Vec<f64>,
    /// `L x S x L x S`, axes `(i, a, j, b)`
    pub x_pair: Vec<f64>,
}

impl RawParameters {
    /// Wrap raw arrays, checking their lengths
    pub fn new(n_cols: usize, n_states: usize, x_single: Vec<f64>, x_pair: Vec<f64>) -> Result<Self> {
        let layout = ParameterLayout::new(n_cols, n_states);
        if x_single.len() != layout.single_len() || x_pair.len() != layout.pair_len() {
            return Err(PottsError::invalid_data(format!(
                "raw parameters have {} single and {} pair entries, expected {} and {}",
                x_single.len(),
                x_pair.len(),
                layout.single_len(),
                layout.pair_len()
            )));
        }
        Ok(Self {
            n_cols,
            n_states,
            x_single,
            x_pair,
        })
    }

    /// All-zero parameters
    pub fn zeros(n_cols: usize, n_states: usize) -> Self {
        let layout = ParameterLayout::new(n_cols, n_states);
        Self {
            n_cols,
            n_states,
            x_single: vec![0.0; layout.single_len()],
            x_pair: vec![0.0; layout.pair_len()],
        }
    }

    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout::new(self.n_cols, self.n_states)
    }

    /// Flatten into `[v | w]`, transposing pairs from `(i,a,j,b)` to `(i,j,a,b)`
    pub fn flatten(&self) -> Vec<f64> {
        let layout = self.layout();
        let (l, s) = (self.n_cols, self.n_states);
        let mut x = Vec::with_capacity(layout.len());
        x.extend_from_slice(&self.x_single);
        x.resize(layout.len(), 0.0);

        let pair = &mut x[layout.single_len()..];
        for i in 0..l {
            for a in 0..s {
                for j in 0..l {
                    for b in 0..s {
                        let raw = ((i * s + a) * l + j) * s + b;
                        pair[layout.pair_index(i, j, a, b)] = self.x_pair[raw];
                    }
                }
            }
        }
        x
    }

    /// Inverse of [`RawParameters::flatten`]
    pub fn from_flat(layout: ParameterLayout, x: &[f64]) -> Result<Self> {
        layout.check(x)?;
        let (l, s) = (layout.n_cols, layout.n_states);
        let (single, pair) = layout.split(x);
        let mut x_pair = vec![0.0; layout.pair_len()];
        for i in 0..l {
            for j in 0..l {
                for a in 0..s {
                    for b in 0..s {
                        let raw = ((i * s + a) * l + j) * s + b;
                        x_pair[raw] = pair[layout.pair_index(i, j, a, b)];
                    }
                }
            }
        }
        Ok(Self {
            n_cols: l,
            n_states: s,
            x_single: single.to_vec(),
            x_pair,
        })
    }
}
