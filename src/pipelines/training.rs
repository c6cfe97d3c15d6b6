//! # Training Pipeline
//!
//! ## Role
//! Drives an [`Objective`] with plain gradient descent and wires file I/O,
//! sequence weighting and sampler choice together for the binary.
//!
//! ## Flow
//! 1. Load the PSICOV alignment and compute sequence weights.
//! 2. Build the starting vector from `--init` raw parameters, or from centered
//!    log frequencies when none are given.
//! 3. Build the objective with a Gibbs sampler, or a tree sampler when a
//!    Newick tree is supplied.
//! 4. Run `x <- x - learning_rate * gradient` for the configured iterations.
//! 5. Write the final parameters in raw format, and a JSON run summary
//!    (settings and per-iteration history) to `<out>.json`.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, instrument};

use crate::config::Config;
use crate::data::alignment::Alignment;
use crate::data::alphabet::Alphabet;
use crate::data::weights::SequenceWeights;
use crate::error::{PottsError, Result};
use crate::io::newick::read_newick;
use crate::io::psicov::read_psicov;
use crate::io::raw::{read_raw, write_raw};
use crate::model::parameters::{ParameterLayout, RawParameters};
use crate::model::sampler::GibbsSampler;
use crate::objective::{CdConfig, ContrastiveDivergence, Objective};

/// Optimizer settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub iterations: usize,
    pub learning_rate: f64,
}

/// Scalars logged for one iteration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub value: f64,
    pub penalty: f64,
    pub gradient_norm: f64,
}

/// Settings and history of one training run, written next to the parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub msa: PathBuf,
    pub tree: Option<PathBuf>,
    pub alphabet: Alphabet,
    pub layout: ParameterLayout,
    pub neff: f64,
    pub cd: CdConfig,
    pub training: TrainingConfig,
    pub history: Vec<IterationRecord>,
}

impl RunSummary {
    /// `<out>.json` for the parameter file `out`
    pub fn path_for(out: &Path) -> PathBuf {
        let mut name = OsString::from(out.as_os_str());
        name.push(".json");
        PathBuf::from(name)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }
}

/// Fixed-step gradient descent
#[derive(Clone, Debug)]
pub struct GradientDescent {
    config: TrainingConfig,
}

impl GradientDescent {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        if !(config.learning_rate.is_finite() && config.learning_rate > 0.0) {
            return Err(PottsError::config("learning rate must be positive"));
        }
        Ok(Self { config })
    }

    /// Minimize `objective` starting from `x`, updating `x` in place.
    #[instrument(name = "gradient_descent", skip_all, fields(n_params = x.len()))]
    pub fn minimize<O: Objective>(&self, objective: &mut O, x: &mut [f64]) -> Result<Vec<IterationRecord>> {
        if x.len() != objective.n_params() {
            return Err(PottsError::shape(format!(
                "start vector has {} entries, objective expects {}",
                x.len(),
                objective.n_params()
            )));
        }
        let mut gradient = vec![0.0; x.len()];
        let mut history = Vec::with_capacity(self.config.iterations);

        for iteration in 0..self.config.iterations {
            let v = objective.evaluate_into(x, &mut gradient)?;
            let gradient_norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
            for (xi, &g) in x.iter_mut().zip(&gradient) {
                *xi -= self.config.learning_rate * g;
            }
            info!(iteration, value = v.value, penalty = v.penalty, gradient_norm, "iteration");
            history.push(IterationRecord {
                iteration,
                value: v.value,
                penalty: v.penalty,
                gradient_norm,
            });
        }
        Ok(history)
    }
}

/// End-to-end training run for the CLI
pub struct TrainingPipeline {
    config: Config,
}

impl TrainingPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&mut self) -> Result<Vec<IterationRecord>> {
        eprintln!("Loading alignment...");
        let msa = read_psicov(&self.config.msa)?;
        eprintln!("  {} sequences x {} columns", msa.n_rows(), msa.n_cols());

        let weights = info_span!("reweight").in_scope(|| self.weights(&msa));
        let neff = weights.neff();
        eprintln!("  Effective sequences: {:.1}", neff);
        let alphabet = msa.alphabet();

        let raw = self.config.init.as_deref().map(read_raw).transpose()?;
        let cd_config = self.config.cd_config();
        let optimizer = GradientDescent::new(self.config.training_config())?;

        let layout = ParameterLayout::new(msa.n_cols(), msa.alphabet().n_states());
        let (x, history) = match &self.config.tree {
            Some(tree_path) => {
                eprintln!("Tree-guided sampling from {:?}", tree_path);
                let tree = read_newick(tree_path)?;
                let raw = raw.unwrap_or_else(|| RawParameters::zeros(layout.n_cols, layout.n_states));
                let (mut x, mut objective) = ContrastiveDivergence::tree_guided(
                    msa,
                    &tree,
                    self.config.root_row,
                    weights,
                    &raw,
                    cd_config.clone(),
                )?;
                let history = optimizer.minimize(&mut objective, &mut x)?;
                (x, history)
            }
            None => {
                let sampler = GibbsSampler::new(alphabet, cd_config.sampler.clone());
                let (mut x, mut objective) = match &raw {
                    Some(raw) => ContrastiveDivergence::init_from_raw(msa, weights, raw, cd_config.clone(), sampler)?,
                    None => ContrastiveDivergence::init_centered(msa, weights, cd_config.clone(), sampler)?,
                };
                let history = optimizer.minimize(&mut objective, &mut x)?;
                (x, history)
            }
        };

        if let Some(last) = history.last() {
            eprintln!(
                "Final value {:.4} (penalty {:.4}), gradient norm {:.4}",
                last.value, last.penalty, last.gradient_norm
            );
        }

        eprintln!("Writing parameters to {:?}", self.config.out);
        write_raw(&self.config.out, &RawParameters::from_flat(layout, &x)?)?;

        let summary = RunSummary {
            msa: self.config.msa.clone(),
            tree: self.config.tree.clone(),
            alphabet,
            layout,
            neff,
            cd: cd_config,
            training: self.config.training_config(),
            history,
        };
        let summary_path = RunSummary::path_for(&self.config.out);
        eprintln!("Writing run summary to {:?}", summary_path);
        summary.write(&summary_path)?;
        Ok(summary.history)
    }

    fn weights(&self, msa: &Alignment) -> SequenceWeights {
        if self.config.uniform_weights {
            SequenceWeights::uniform(msa.n_rows())
        } else {
            SequenceWeights::by_identity(msa, self.config.reweight_threshold)
        }
    }
}
