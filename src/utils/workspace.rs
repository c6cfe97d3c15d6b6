//! # Workspace Pattern for Sample Buffers
//!
//! Pre-allocated buffers for the negative phase so the optimizer loop does
//! not allocate per evaluation.
//!
//! ## Single Writer
//! A workspace is owned by exactly one objective and mutated only inside its
//! `evaluate` call. The objective takes `&mut self`, so two concurrent
//! evaluations of the same instance cannot be expressed; callers that share
//! an objective across threads must serialize access themselves.

use crate::model::counts::FrequencyTables;
use crate::model::parameters::ParameterLayout;

/// Workspace for contrastive divergence evaluations
#[derive(Debug)]
pub struct SampleWorkspace {
    /// Sampled alignment, `n_samples x n_cols`, row-major
    pub sampled: Vec<u8>,

    /// Number of sampled rows
    pub n_samples: usize,

    /// Number of columns per row
    pub n_cols: usize,

    /// Negative-phase frequencies of `sampled`
    pub negative: FrequencyTables,
}

impl SampleWorkspace {
    /// Create a workspace with given capacities
    pub fn new(n_samples: usize, layout: ParameterLayout) -> Self {
        Self {
            sampled: vec![0; n_samples * layout.n_cols],
            n_samples,
            n_cols: layout.n_cols,
            negative: FrequencyTables::new(layout),
        }
    }

    /// Get one sampled row
    pub fn row(&self, row: usize) -> &[u8] {
        &self.sampled[row * self.n_cols..(row + 1) * self.n_cols]
    }

    /// Overwrite sampled rows from the given sources
    pub fn seed_from<'a>(&mut self, sources: impl Iterator<Item = &'a [u8]>) {
        for (dst, src) in self.sampled.chunks_exact_mut(self.n_cols).zip(sources) {
            dst.copy_from_slice(src);
        }
    }

    /// Recompute negative-phase frequencies with uniform weights
    pub fn update_negative(&mut self) {
        self.negative.accumulate(&self.sampled, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_creation() {
        let ws = SampleWorkspace::new(10, ParameterLayout::new(4, 21));
        assert_eq!(ws.sampled.len(), 40);
        assert_eq!(ws.negative.single.len(), 4 * 21);
    }

    #[test]
    fn test_seed_and_count() {
        let mut ws = SampleWorkspace::new(2, ParameterLayout::new(2, 2));
        let rows: [&[u8]; 2] = [&[0, 1], &[1, 1]];
        ws.seed_from(rows.iter().copied());
        assert_eq!(ws.row(1), &[1, 1]);

        ws.update_negative();
        assert_eq!(ws.negative.single, vec![0.5, 0.5, 0.0, 1.0]);
    }
}
