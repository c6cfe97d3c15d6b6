//! # Configuration Logic
//!
//! ## Role
//! CLI argument parsing and validation, and conversion into the validated
//! library configuration structs.
//!
//! ## Validation
//! - Input files exist
//! - Regularization strengths finite and non-negative
//! - Positive sweep, round and iteration counts; positive learning rate
//! - Reweighting threshold within `[0, 1]`
//!
//! ## Example CLI
//! ```bash
//! potts-cd --msa family.psc --out family.raw --iterations 200 --nthreads 8
//! potts-cd --msa family.psc.gz --tree family.nwk --root-row 0 --out family.raw
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::data::weights::DEFAULT_IDENTITY_THRESHOLD;
use crate::error::{PottsError, Result};
use crate::model::regularization::{RegularizationConfig, DEFAULT_LAMBDA_PAIR_FACTOR, DEFAULT_LAMBDA_SINGLE};
use crate::model::sampler::{SamplerConfig, DEFAULT_SEED, DEFAULT_SWEEPS};
use crate::objective::cd::CdConfig;
use crate::pipelines::training::TrainingConfig;
use crate::utils::threading::resolve_threads;

/// Learn Potts model couplings from a multiple sequence alignment by
/// contrastive divergence.
#[derive(Parser, Debug, Clone)]
#[command(name = "potts-cd", version, about)]
pub struct Config {
    /// Input alignment in PSICOV format (plain or .gz)
    #[arg(long)]
    pub msa: PathBuf,

    /// Phylogenetic tree in Newick format; enables tree-guided sampling
    #[arg(long)]
    pub tree: Option<PathBuf>,

    /// Alignment row used as the tree root sequence
    #[arg(long, default_value_t = 0)]
    pub root_row: usize,

    /// Initial raw parameters; single potentials also become the prior center
    #[arg(long)]
    pub init: Option<PathBuf>,

    /// Output path for the learned raw parameters
    #[arg(long)]
    pub out: PathBuf,

    /// Single-site regularization strength
    #[arg(long, default_value_t = DEFAULT_LAMBDA_SINGLE)]
    pub lambda_single: f64,

    /// Pair regularization factor, multiplied by (columns - 1)
    #[arg(long, default_value_t = DEFAULT_LAMBDA_PAIR_FACTOR)]
    pub lambda_pair_factor: f64,

    /// Sampled sequences per evaluation (default: alignment rows or tree leaves)
    #[arg(long)]
    pub n_samples: Option<usize>,

    /// Gibbs sweeps per sampled row
    #[arg(long, default_value_t = DEFAULT_SWEEPS)]
    pub sweeps: usize,

    /// Sampler invocations per evaluation
    #[arg(long, default_value_t = 1)]
    pub rounds: usize,

    /// Continue Markov chains across evaluations instead of reseeding
    #[arg(long)]
    pub persistent: bool,

    /// Gradient descent iterations
    #[arg(long, default_value_t = 100)]
    pub iterations: usize,

    /// Gradient descent step size
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Random seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Number of threads (default: all cores)
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Identity threshold for sequence reweighting
    #[arg(long, default_value_t = DEFAULT_IDENTITY_THRESHOLD)]
    pub reweight_threshold: f64,

    /// Weight every sequence equally
    #[arg(long)]
    pub uniform_weights: bool,

    /// Print span timings
    #[arg(long)]
    pub profile: bool,
}

impl Config {
    /// Parse command line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.msa.exists() {
            return Err(PottsError::config(format!("Alignment file not found: {:?}", self.msa)));
        }
        for path in self.tree.iter().chain(&self.init) {
            if !path.exists() {
                return Err(PottsError::config(format!("Input file not found: {:?}", path)));
            }
        }
        if !(self.lambda_single.is_finite() && self.lambda_single >= 0.0) {
            return Err(PottsError::config("lambda-single must be finite and non-negative"));
        }
        if !(self.lambda_pair_factor.is_finite() && self.lambda_pair_factor >= 0.0) {
            return Err(PottsError::config("lambda-pair-factor must be finite and non-negative"));
        }
        if self.sweeps == 0 || self.rounds == 0 {
            return Err(PottsError::config("sweeps and rounds must be positive"));
        }
        if self.n_samples == Some(0) {
            return Err(PottsError::config("n-samples must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PottsError::config("learning-rate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.reweight_threshold) {
            return Err(PottsError::config("reweight-threshold must lie in [0, 1]"));
        }
        Ok(())
    }

    /// Get the number of threads to use
    pub fn nthreads(&self) -> usize {
        resolve_threads(self.nthreads.unwrap_or(0))
    }

    /// Objective configuration derived from the CLI
    pub fn cd_config(&self) -> CdConfig {
        CdConfig {
            n_samples: self.n_samples,
            n_rounds: self.rounds,
            persistent: self.persistent,
            regularization: RegularizationConfig {
                lambda_single: self.lambda_single,
                lambda_pair_factor: self.lambda_pair_factor,
                pair_mat: None,
            },
            sampler: SamplerConfig {
                n_sweeps: self.sweeps,
                seed: self.seed,
            },
        }
    }

    /// Optimizer configuration derived from the CLI
    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            iterations: self.iterations,
            learning_rate: self.learning_rate,
        }
    }
}
