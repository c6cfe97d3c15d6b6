//! # Potts CD Library
//!
//! Contrastive divergence training of pairwise Potts models on multiple
//! sequence alignments, for residue-contact prediction.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: Alphabet, alignment, sequence weights and phylogenetic trees
//! - `error`: Error types and result aliases
//! - `io`: File reading/writing (PSICOV, Newick, raw parameters)
//! - `model`: Parameter layout, frequency tables, regularization and samplers
//! - `objective`: Contrastive divergence objectives for an external optimizer
//! - `pipelines`: High-level workflow orchestration
//! - `utils`: Shared utilities (thread pool, workspace pattern)

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod objective;
pub mod pipelines;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use data::{Alignment, Alphabet, Clade, SequenceWeights, Tree, TreeTopology};
pub use error::{PottsError, Result};
pub use model::{
    FrequencyTables, GibbsSampler, ParameterLayout, RawParameters, Regularization, RegularizationConfig,
    SamplerConfig, SequenceSampler, TreeSampler,
};
pub use objective::{
    CdConfig, ContrastiveDivergence, Evaluation, Objective, ObjectiveValue, TreeContrastiveDivergence, ValueKind,
};
pub use pipelines::{GradientDescent, RunSummary, TrainingConfig, TrainingPipeline};
