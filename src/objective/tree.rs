//! Tree-guided contrastive divergence.
//!
//! Same objective as [`ContrastiveDivergence`], with the negative phase drawn
//! by propagating an alignment row down a phylogeny. Leaves are the sampled
//! rows, so the sample count is the leaf count.

use crate::data::alignment::Alignment;
use crate::data::tree::{Tree, TreeTopology};
use crate::data::weights::SequenceWeights;
use crate::error::{PottsError, Result};
use crate::model::parameters::RawParameters;
use crate::model::regularization::SingleCenter;
use crate::model::tree_sampler::TreeSampler;
use crate::objective::cd::{check_raw, CdConfig, ContrastiveDivergence, Seeding};

/// Contrastive divergence with a tree-guided sampler
pub type TreeContrastiveDivergence = ContrastiveDivergence<TreeSampler>;

impl ContrastiveDivergence<TreeSampler> {
    /// Build a tree-guided objective rooted at alignment row `seq0`.
    ///
    /// Fails with `ColumnMismatch` if `raw` disagrees with the alignment and
    /// with `DegenerateTree` if `config.n_samples` is set to anything other
    /// than the tree's leaf count. Returns the flattened starting vector and
    /// the objective.
    pub fn tree_guided(
        msa: Alignment,
        tree: &Tree,
        seq0: usize,
        weights: SequenceWeights,
        raw: &RawParameters,
        config: CdConfig,
    ) -> Result<(Vec<f64>, Self)> {
        check_raw(&msa, raw)?;
        if seq0 >= msa.n_rows() {
            return Err(PottsError::config(format!(
                "root row {} is out of range for an alignment of {} rows",
                seq0,
                msa.n_rows()
            )));
        }

        let topology = TreeTopology::from_tree(tree)?;
        let leaves = topology.n_leaves();
        let n_samples = config.n_samples.unwrap_or(leaves);
        if n_samples != leaves {
            return Err(PottsError::DegenerateTree {
                leaves,
                samples: n_samples,
            });
        }

        let sampler = TreeSampler::new(topology, msa.row(seq0).to_vec(), msa.alphabet(), config.sampler.clone())?;
        let center = SingleCenter::new(raw.n_cols, raw.n_states, raw.x_single.clone())?;
        let x = raw.flatten();
        let objective =
            Self::with_seeding(msa, weights, config, center, sampler, n_samples, Seeding::Generated)?;
        Ok((x, objective))
    }

    /// Child counts per node in BFS order
    pub fn n_children(&self) -> &[usize] {
        &self.sampler().topology().n_children
    }

    /// Branch lengths per node in BFS order, root first with length 0
    pub fn branch_lengths(&self) -> &[f64] {
        &self.sampler().topology().branch_lengths
    }
}
