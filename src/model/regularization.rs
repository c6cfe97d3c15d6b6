//! # Regularization
//!
//! ## Role
//! Tikhonov penalties on single and pair potentials with their exact gradients.
//!
//! ## Terms
//! ```text
//! L2:  value  = λs Σ (v - c)²  + ½ λp Σ w²
//!      g_v    = 2 λs (v - c)
//!      g_w    = λp w
//!
//! L3:  value  = λs Σ (v - c)²  + ½ Σ M ⊙ w²
//!      g_w    = M ⊙ w
//! ```
//! with `λp = λ_pair_factor * scaling`, where `scaling` is fixed at
//! construction (`n_cols - 1` for the training objective).
//!
//! ## Center Width
//! The center `c` is an `L x C` table whose width `C` may differ from the
//! number of states `S` of `v`. Offsets are taken over the first
//! `min(C, S)` symbols of each column only: extra center symbols are ignored
//! and symbols of `v` beyond the center width contribute neither penalty nor
//! gradient.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PottsError, Result};
use crate::model::parameters::ParameterLayout;

/// Default single-site strength
pub const DEFAULT_LAMBDA_SINGLE: f64 = 1e4;

/// Default pair-site factor, multiplied by `n_cols - 1`
pub const DEFAULT_LAMBDA_PAIR_FACTOR: f64 = 0.2;

/// Recognized regularization settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegularizationConfig {
    pub lambda_single: f64,
    pub lambda_pair_factor: f64,
    /// Elementwise pair weights (`L x L x S x S`). Selects the L3 variant.
    #[serde(default)]
    pub pair_mat: Option<Vec<f64>>,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            lambda_single: DEFAULT_LAMBDA_SINGLE,
            lambda_pair_factor: DEFAULT_LAMBDA_PAIR_FACTOR,
            pair_mat: None,
        }
    }
}

impl RegularizationConfig {
    /// No regularization at all
    pub fn none() -> Self {
        Self {
            lambda_single: 0.0,
            lambda_pair_factor: 0.0,
            pair_mat: None,
        }
    }

    fn validate(&self, layout: ParameterLayout) -> Result<()> {
        for (name, value) in [
            ("lambda_single", self.lambda_single),
            ("lambda_pair_factor", self.lambda_pair_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PottsError::config(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if let Some(mat) = &self.pair_mat {
            if mat.len() != layout.pair_len() {
                return Err(PottsError::config(format!(
                    "pair_mat has {} entries, expected {}",
                    mat.len(),
                    layout.pair_len()
                )));
            }
            if mat.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(PottsError::config("pair_mat entries must be finite and non-negative"));
            }
            let asym = layout.pair_asymmetry(mat);
            if asym > 1e-12 {
                return Err(PottsError::config(format!(
                    "pair_mat must satisfy M[i,j,a,b] == M[j,i,b,a] (max deviation {})",
                    asym
                )));
            }
        }
        Ok(())
    }
}

/// Prior mean of the single-site potentials, `L x width`.
#[derive(Clone, Debug, PartialEq)]
pub struct SingleCenter {
    pub n_cols: usize,
    pub width: usize,
    pub values: Vec<f64>,
}

impl SingleCenter {
    pub fn new(n_cols: usize, width: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_cols * width {
            return Err(PottsError::invalid_data(format!(
                "center has {} entries, expected {} x {}",
                values.len(),
                n_cols,
                width
            )));
        }
        Ok(Self {
            n_cols,
            width,
            values,
        })
    }

    /// A zero center matching the layout
    pub fn zeros(layout: ParameterLayout) -> Self {
        Self {
            n_cols: layout.n_cols,
            width: layout.n_states,
            values: vec![0.0; layout.single_len()],
        }
    }
}

/// Penalty value and gradients of one regularization evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct RegularizationTerms {
    pub value: f64,
    pub g_single: Vec<f64>,
    pub g_pair: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
enum PairPenalty {
    Scalar,
    Weighted(Vec<f64>),
}

/// A validated regularizer (L2 or L3). Holds construction-time constants only.
#[derive(Clone, Debug, PartialEq)]
pub struct Regularization {
    layout: ParameterLayout,
    lambda_single: f64,
    lambda_pair_factor: f64,
    lambda_pair: f64,
    center: SingleCenter,
    pair: PairPenalty,
}

impl Regularization {
    /// Build from a configuration. `scaling` multiplies `lambda_pair_factor`.
    pub fn new(
        config: &RegularizationConfig,
        layout: ParameterLayout,
        scaling: f64,
        center: SingleCenter,
    ) -> Result<Self> {
        config.validate(layout)?;
        if center.n_cols != layout.n_cols {
            return Err(PottsError::column_mismatch(
                "regularization center",
                layout.n_cols,
                center.n_cols,
            ));
        }
        let pair = match &config.pair_mat {
            Some(mat) => PairPenalty::Weighted(mat.clone()),
            None => PairPenalty::Scalar,
        };
        Ok(Self {
            layout,
            lambda_single: config.lambda_single,
            lambda_pair_factor: config.lambda_pair_factor,
            lambda_pair: config.lambda_pair_factor * scaling,
            center,
            pair,
        })
    }

    /// Plain L2 with the given strengths
    pub fn l2(
        layout: ParameterLayout,
        lambda_single: f64,
        lambda_pair_factor: f64,
        scaling: f64,
        center: SingleCenter,
    ) -> Result<Self> {
        let config = RegularizationConfig {
            lambda_single,
            lambda_pair_factor,
            pair_mat: None,
        };
        Self::new(&config, layout, scaling, center)
    }

    /// L3 with an elementwise pair weight matrix
    pub fn l3(
        layout: ParameterLayout,
        lambda_single: f64,
        lambda_pair_factor: f64,
        scaling: f64,
        center: SingleCenter,
        pair_mat: Vec<f64>,
    ) -> Result<Self> {
        let config = RegularizationConfig {
            lambda_single,
            lambda_pair_factor,
            pair_mat: Some(pair_mat),
        };
        Self::new(&config, layout, scaling, center)
    }

    pub fn lambda_single(&self) -> f64 {
        self.lambda_single
    }

    /// Effective scalar pair strength (`factor * scaling`)
    pub fn lambda_pair(&self) -> f64 {
        self.lambda_pair
    }

    pub fn center(&self) -> &SingleCenter {
        &self.center
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self.pair, PairPenalty::Weighted(_))
    }

    /// Penalty and gradients as fresh buffers
    pub fn penalty_and_gradient(&self, x_single: &[f64], x_pair: &[f64]) -> RegularizationTerms {
        let mut g_single = vec![0.0; x_single.len()];
        let mut g_pair = vec![0.0; x_pair.len()];
        let value = self.accumulate(x_single, x_pair, &mut g_single, &mut g_pair);
        RegularizationTerms {
            value,
            g_single,
            g_pair,
        }
    }

    /// Add the gradients into `g_single` / `g_pair` and return the penalty.
    pub fn accumulate(
        &self,
        x_single: &[f64],
        x_pair: &[f64],
        g_single: &mut [f64],
        g_pair: &mut [f64],
    ) -> f64 {
        debug_assert_eq!(x_single.len(), self.layout.single_len());
        debug_assert_eq!(x_pair.len(), self.layout.pair_len());

        let s = self.layout.n_states;
        let width = self.center.width;
        let overlap = s.min(width);

        let mut single_sum = 0.0;
        for i in 0..self.layout.n_cols {
            for a in 0..overlap {
                let ofs = x_single[i * s + a] - self.center.values[i * width + a];
                single_sum += ofs * ofs;
                g_single[i * s + a] += 2.0 * self.lambda_single * ofs;
            }
        }

        let pair_sum = match &self.pair {
            PairPenalty::Scalar => {
                let mut sum = 0.0;
                for (g, &w) in g_pair.iter_mut().zip(x_pair) {
                    sum += w * w * self.lambda_pair;
                    *g += self.lambda_pair * w;
                }
                sum
            }
            PairPenalty::Weighted(mat) => {
                let mut sum = 0.0;
                for ((g, &w), &m) in g_pair.iter_mut().zip(x_pair).zip(mat) {
                    sum += w * w * m;
                    *g += m * w;
                }
                sum
            }
        };

        self.lambda_single * single_sum + 0.5 * pair_sum
    }
}

impl fmt::Display for Regularization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.is_weighted() { "L3" } else { "L2" };
        write!(
            f,
            "{} regularization (λsingle={} λpairfactor={} λpair={})",
            name, self.lambda_single, self.lambda_pair_factor, self.lambda_pair
        )
    }
}
