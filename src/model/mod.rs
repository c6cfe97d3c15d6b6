//! # Model Module
//!
//! The Potts model pieces that the training objective composes.
//!
//! ## Core Pieces
//! - `parameters`: flattened parameter layout and raw-parameter conversion
//! - `counts`: weighted single- and pair-site frequencies
//! - `regularization`: L2 and pair-weighted L3 penalties with analytic gradients
//! - `sampler`: the `SequenceSampler` boundary and the parallel Gibbs sampler
//! - `tree_sampler`: mutation of sequences along a phylogeny
//!
//! ## Parameter Convention
//! `x = [v | w]` with `v[i,a]` at `i*S + a` and `w[i,j,a,b]` at
//! `L*S + ((i*L + j)*S + a)*S + b`. Pair potentials are symmetric,
//! `w[i,j,a,b] == w[j,i,b,a]`, and every routine that reshapes `x` keeps it so.

pub mod counts;
pub mod parameters;
pub mod regularization;
pub mod sampler;
pub mod tree_sampler;

pub use counts::FrequencyTables;
pub use parameters::{ParameterLayout, RawParameters};
pub use regularization::{Regularization, RegularizationConfig, RegularizationTerms};
pub use sampler::{GibbsSampler, SamplerConfig, SequenceSampler};
pub use tree_sampler::TreeSampler;
