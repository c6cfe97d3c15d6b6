//! # Contrastive Divergence Objective
//!
//! ## Role
//! Stochastic gradient of the Potts log-likelihood: observed frequencies of
//! the weighted alignment minus frequencies of sequences resampled under the
//! current parameters, combined with the regularization term.
//!
//! ## Evaluation Steps
//! 1. Seed the sample buffer from the configured alignment rows (skipped for
//!    persistent chains after the first call and for samplers that generate
//!    every row themselves).
//! 2. Run the sampler `n_rounds` times on the buffer.
//! 3. Count negative-phase frequencies with uniform weights.
//! 4. Combine with the cached positive-phase frequencies and the
//!    regularization gradient.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::data::alignment::Alignment;
use crate::data::weights::SequenceWeights;
use crate::error::{PottsError, Result};
use crate::model::counts::FrequencyTables;
use crate::model::parameters::{ParameterLayout, RawParameters};
use crate::model::regularization::{Regularization, RegularizationConfig, SingleCenter};
use crate::model::sampler::{SamplerConfig, SequenceSampler};
use crate::objective::{Objective, ObjectiveValue, ValueKind};
use crate::utils::workspace::SampleWorkspace;

/// Objective settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CdConfig {
    /// Sampled rows per evaluation. Defaults to the alignment row count
    /// (or the tree leaf count for tree-guided sampling).
    pub n_samples: Option<usize>,
    /// Sampler invocations per evaluation
    pub n_rounds: usize,
    /// Keep chains running across evaluations instead of reseeding
    pub persistent: bool,
    pub regularization: RegularizationConfig,
    pub sampler: SamplerConfig,
}

impl Default for CdConfig {
    fn default() -> Self {
        Self {
            n_samples: None,
            n_rounds: 1,
            persistent: false,
            regularization: RegularizationConfig::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

/// How the sample buffer is initialized before sampling
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Seeding {
    /// Copy these alignment rows into the buffer, one per sample
    Rows(Vec<usize>),
    /// The sampler overwrites every row itself
    Generated,
}

/// Contrastive divergence objective over a sampler `S`.
pub struct ContrastiveDivergence<S: SequenceSampler> {
    msa: Alignment,
    weights: SequenceWeights,
    layout: ParameterLayout,
    neff: f64,
    positive: FrequencyTables,
    regularization: Regularization,
    sampler: S,
    seeding: Seeding,
    workspace: SampleWorkspace,
    config: CdConfig,
    n_evaluations: u64,
}

impl<S: SequenceSampler> ContrastiveDivergence<S> {
    /// Build an objective with an explicit regularization center.
    pub fn new(
        msa: Alignment,
        weights: SequenceWeights,
        config: CdConfig,
        center: SingleCenter,
        sampler: S,
    ) -> Result<Self> {
        let n_samples = config.n_samples.unwrap_or(msa.n_rows());
        let seeding = Self::seed_rows(&msa, n_samples, config.sampler.seed);
        Self::with_seeding(msa, weights, config, center, sampler, n_samples, seeding)
    }

    pub(crate) fn with_seeding(
        msa: Alignment,
        weights: SequenceWeights,
        config: CdConfig,
        center: SingleCenter,
        sampler: S,
        n_samples: usize,
        seeding: Seeding,
    ) -> Result<Self> {
        weights.check_rows(&msa)?;
        if n_samples == 0 {
            return Err(PottsError::config("n_samples must be positive"));
        }
        if config.n_rounds == 0 {
            return Err(PottsError::config("n_rounds must be positive"));
        }

        let layout = ParameterLayout::new(msa.n_cols(), msa.alphabet().n_states());
        let scaling = (msa.n_cols() as f64 - 1.0).max(0.0);
        let regularization = Regularization::new(&config.regularization, layout, scaling, center)?;

        let positive = {
            let _span = info_span!("positive_phase").entered();
            FrequencyTables::from_rows(layout, msa.as_slice(), Some(weights.as_slice()))
        };
        let neff = weights.neff();

        info!(
            n_rows = msa.n_rows(),
            n_cols = msa.n_cols(),
            n_samples,
            neff,
            "contrastive divergence objective ready, {}",
            regularization
        );

        Ok(Self {
            workspace: SampleWorkspace::new(n_samples, layout),
            msa,
            weights,
            layout,
            neff,
            positive,
            regularization,
            sampler,
            seeding,
            config,
            n_evaluations: 0,
        })
    }

    /// Build from a raw-parameter source.
    ///
    /// Returns the flattened starting vector and the objective. The raw
    /// single-site potentials become the regularization center. A column
    /// count that differs from the alignment fails before anything else.
    pub fn init_from_raw(
        msa: Alignment,
        weights: SequenceWeights,
        raw: &RawParameters,
        config: CdConfig,
        sampler: S,
    ) -> Result<(Vec<f64>, Self)> {
        check_raw(&msa, raw)?;
        let center = SingleCenter::new(raw.n_cols, raw.n_states, raw.x_single.clone())?;
        let x = raw.flatten();
        let objective = Self::new(msa, weights, config, center, sampler)?;
        Ok((x, objective))
    }

    /// Build without a raw source, centering single potentials on the log
    /// frequencies of the weighted alignment (pseudocount 1).
    ///
    /// Returns the starting vector (center singles, zero pairs) and the objective.
    pub fn init_centered(
        msa: Alignment,
        weights: SequenceWeights,
        config: CdConfig,
        sampler: S,
    ) -> Result<(Vec<f64>, Self)> {
        weights.check_rows(&msa)?;
        let layout = ParameterLayout::new(msa.n_cols(), msa.alphabet().n_states());
        let center = log_frequency_center(&msa, &weights, layout);
        let mut x = vec![0.0; layout.len()];
        x[..layout.single_len()].copy_from_slice(&center.values);
        let objective = Self::new(msa, weights, config, center, sampler)?;
        Ok((x, objective))
    }

    fn seed_rows(msa: &Alignment, n_samples: usize, seed: u64) -> Seeding {
        if n_samples == msa.n_rows() {
            return Seeding::Rows((0..n_samples).collect());
        }
        let mut rng = SmallRng::seed_from_u64(seed);
        Seeding::Rows((0..n_samples).map(|_| rng.random_range(0..msa.n_rows())).collect())
    }

    pub fn layout(&self) -> ParameterLayout {
        self.layout
    }

    pub fn alignment(&self) -> &Alignment {
        &self.msa
    }

    pub fn weights(&self) -> &SequenceWeights {
        &self.weights
    }

    /// Effective number of sequences
    pub fn neff(&self) -> f64 {
        self.neff
    }

    pub fn n_samples(&self) -> usize {
        self.workspace.n_samples
    }

    pub fn regularization(&self) -> &Regularization {
        &self.regularization
    }

    pub fn config(&self) -> &CdConfig {
        &self.config
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Observed (positive-phase) frequencies
    pub fn positive(&self) -> &FrequencyTables {
        &self.positive
    }

    /// Sampled (negative-phase) frequencies of the latest evaluation
    pub fn negative(&self) -> &FrequencyTables {
        &self.workspace.negative
    }

    /// Sampled alignment of the latest evaluation, row-major
    pub fn sampled_alignment(&self) -> &[u8] {
        &self.workspace.sampled
    }

    fn seed_buffer(&mut self) {
        if self.config.persistent && self.n_evaluations > 0 {
            return;
        }
        if let Seeding::Rows(rows) = &self.seeding {
            let msa = &self.msa;
            self.workspace.seed_from(rows.iter().map(|&r| msa.row(r)));
        }
    }
}

impl<S: SequenceSampler> Objective for ContrastiveDivergence<S> {
    fn n_params(&self) -> usize {
        self.layout.len()
    }

    fn evaluate_into(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<ObjectiveValue> {
        let _span = info_span!("cd_evaluate", evaluation = self.n_evaluations).entered();
        self.layout.check(x)?;
        if gradient.len() != self.layout.len() {
            return Err(PottsError::shape(format!(
                "gradient buffer has {} entries, expected {}",
                gradient.len(),
                self.layout.len()
            )));
        }

        self.seed_buffer();
        let (n_samples, n_cols) = (self.workspace.n_samples, self.workspace.n_cols);
        for _ in 0..self.config.n_rounds {
            self.sampler
                .sample(&mut self.workspace.sampled, n_samples, n_cols, x)?;
        }
        self.workspace.update_negative();
        self.n_evaluations += 1;

        let neff = self.neff;
        let negative = &self.workspace.negative;
        let (g_single, g_pair) = self.layout.split_mut(gradient);
        let mut sq_diff = 0.0;
        for ((g, &pos), &neg) in g_single
            .iter_mut()
            .zip(&self.positive.single)
            .zip(&negative.single)
            .chain(g_pair.iter_mut().zip(&self.positive.pair).zip(&negative.pair))
        {
            let diff = pos - neg;
            sq_diff += diff * diff;
            *g = -neff * diff;
        }
        let mismatch = 0.5 * neff * sq_diff;

        let (x_single, x_pair) = self.layout.split(x);
        let penalty = self.regularization.accumulate(x_single, x_pair, g_single, g_pair);
        let value = mismatch + penalty;

        debug!(value, mismatch, penalty, "cd evaluation");
        Ok(ObjectiveValue {
            value,
            kind: ValueKind::MismatchProxy,
            penalty,
            mismatch,
        })
    }
}

/// Ensure a raw-parameter source matches the alignment.
pub(crate) fn check_raw(msa: &Alignment, raw: &RawParameters) -> Result<()> {
    if raw.n_cols != msa.n_cols() {
        return Err(PottsError::column_mismatch("raw parameters", msa.n_cols(), raw.n_cols));
    }
    if raw.n_states != msa.alphabet().n_states() {
        return Err(PottsError::invalid_data(format!(
            "raw parameters have {} states, alignment alphabet has {}",
            raw.n_states,
            msa.alphabet().n_states()
        )));
    }
    Ok(())
}

/// Per-column centered log frequencies with pseudocount 1
fn log_frequency_center(msa: &Alignment, weights: &SequenceWeights, layout: ParameterLayout) -> SingleCenter {
    let s = layout.n_states;
    let neff = weights.neff();
    let mut counts = vec![0.0; layout.single_len()];
    for (n, row) in msa.rows().enumerate() {
        let w = weights.get(n);
        for (i, &a) in row.iter().enumerate() {
            counts[i * s + a as usize] += w;
        }
    }

    let mut values = vec![0.0; layout.single_len()];
    for (column, out) in counts.chunks_exact(s).zip(values.chunks_exact_mut(s)) {
        for (v, &c) in out.iter_mut().zip(column) {
            *v = ((c + 1.0) / (neff + s as f64)).ln();
        }
        let mean = out.iter().sum::<f64>() / s as f64;
        out.iter_mut().for_each(|v| *v -= mean);
    }
    SingleCenter {
        n_cols: layout.n_cols,
        width: s,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::alphabet::Alphabet;
    use crate::model::sampler::GibbsSampler;

    /// Leaves the buffer untouched
    struct Frozen;

    impl SequenceSampler for Frozen {
        fn sample(&mut self, _: &mut [u8], _: usize, _: usize, _: &[f64]) -> Result<()> {
            Ok(())
        }
    }

    /// Overwrites every row with the same symbol
    struct Constant(u8);

    impl SequenceSampler for Constant {
        fn sample(&mut self, buffer: &mut [u8], _: usize, _: usize, _: &[f64]) -> Result<()> {
            buffer.fill(self.0);
            Ok(())
        }
    }

    fn unregularized() -> CdConfig {
        CdConfig {
            regularization: RegularizationConfig::none(),
            ..CdConfig::default()
        }
    }

    #[test]
    fn test_identical_samples_zero_gradient() {
        let msa = Alignment::from_rows(&[vec![1], vec![1], vec![1], vec![1]], Alphabet::new(2, None)).unwrap();
        let raw = RawParameters::zeros(1, 2);
        let (x, mut cd) =
            ContrastiveDivergence::init_from_raw(msa, SequenceWeights::uniform(4), &raw, unregularized(), Frozen)
                .unwrap();
        let eval = cd.evaluate(&x).unwrap();
        assert!(eval.gradient.iter().all(|&g| g == 0.0));
        assert_eq!(eval.value, 0.0);
        assert_eq!(eval.kind, ValueKind::MismatchProxy);
    }

    #[test]
    fn test_gradient_sign_and_scale() {
        // data all symbol 0, samples all symbol 1
        let msa = Alignment::from_rows(&[vec![0, 0], vec![0, 0]], Alphabet::new(2, None)).unwrap();
        let raw = RawParameters::zeros(2, 2);
        let (x, mut cd) =
            ContrastiveDivergence::init_from_raw(msa, SequenceWeights::uniform(2), &raw, unregularized(), Constant(1))
                .unwrap();
        let eval = cd.evaluate(&x).unwrap();
        let layout = cd.layout();
        let g = &eval.gradient;
        // neff * (f_sample - f_data)
        assert_eq!(g[layout.single_index(0, 0)], -2.0);
        assert_eq!(g[layout.single_index(0, 1)], 2.0);
        let pair = &g[layout.single_len()..];
        assert_eq!(pair[layout.pair_index(0, 1, 0, 0)], -2.0);
        assert_eq!(pair[layout.pair_index(1, 0, 1, 1)], 2.0);
        assert_eq!(layout.pair_asymmetry(pair), 0.0);
        // 4 single diffs and 4 off-diagonal pair diffs of magnitude 1
        assert_eq!(eval.mismatch, 0.5 * 2.0 * 8.0);
    }

    #[test]
    fn test_regularization_added() {
        let msa = Alignment::from_rows(&[vec![0, 1], vec![1, 0]], Alphabet::new(2, None)).unwrap();
        let raw = RawParameters::zeros(2, 2);
        let config = CdConfig {
            regularization: RegularizationConfig {
                lambda_single: 0.5,
                lambda_pair_factor: 2.0,
                pair_mat: None,
            },
            ..CdConfig::default()
        };
        let (mut x, mut cd) =
            ContrastiveDivergence::init_from_raw(msa, SequenceWeights::uniform(2), &raw, config, Frozen).unwrap();
        let layout = cd.layout();
        x[0] = 1.0;
        x[layout.single_len() + layout.pair_index(0, 1, 0, 1)] = 1.0;
        x[layout.single_len() + layout.pair_index(1, 0, 1, 0)] = 1.0;

        let eval = cd.evaluate(&x).unwrap();
        // frozen sampler reproduces the data, only the penalty remains
        assert_eq!(eval.mismatch, 0.0);
        // λs * 1 + ½ * λp * 2 with λp = 2 * (2 - 1)
        assert_eq!(eval.penalty, 0.5 + 2.0);
        assert_eq!(eval.gradient[0], 1.0);
        assert_eq!(eval.gradient[layout.single_len() + layout.pair_index(0, 1, 0, 1)], 2.0);
    }

    #[test]
    fn test_column_mismatch_before_sampling() {
        struct Exploding;
        impl SequenceSampler for Exploding {
            fn sample(&mut self, _: &mut [u8], _: usize, _: usize, _: &[f64]) -> Result<()> {
                panic!("sampler must not run");
            }
        }
        let msa = Alignment::from_rows(&[vec![0, 1, 0]], Alphabet::new(2, None)).unwrap();
        let raw = RawParameters::zeros(2, 2);
        let res = ContrastiveDivergence::init_from_raw(msa, SequenceWeights::uniform(1), &raw, CdConfig::default(), Exploding);
        assert!(matches!(
            res,
            Err(PottsError::ColumnMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_buffer_reused_and_reseeded() {
        let msa = Alignment::from_rows(&[vec![0, 1], vec![1, 0]], Alphabet::new(2, None)).unwrap();
        let raw = RawParameters::zeros(2, 2);
        let (x, mut cd) =
            ContrastiveDivergence::init_from_raw(msa, SequenceWeights::uniform(2), &raw, unregularized(), Constant(1))
                .unwrap();
        let ptr = cd.sampled_alignment().as_ptr();
        cd.evaluate(&x).unwrap();
        assert_eq!(cd.sampled_alignment(), &[1, 1, 1, 1]);
        cd.evaluate(&x).unwrap();
        assert_eq!(cd.sampled_alignment().as_ptr(), ptr);
    }

    #[test]
    fn test_persistent_chains_not_reseeded() {
        struct Increment;
        impl SequenceSampler for Increment {
            fn sample(&mut self, buffer: &mut [u8], _: usize, _: usize, _: &[f64]) -> Result<()> {
                buffer.iter_mut().for_each(|c| *c = (*c + 1) % 3);
                Ok(())
            }
        }
        let msa = Alignment::from_rows(&[vec![0]], Alphabet::new(3, None)).unwrap();
        let raw = RawParameters::zeros(1, 3);
        let config = CdConfig {
            persistent: true,
            ..unregularized()
        };
        let (x, mut cd) =
            ContrastiveDivergence::init_from_raw(msa, SequenceWeights::uniform(1), &raw, config, Increment).unwrap();
        cd.evaluate(&x).unwrap();
        cd.evaluate(&x).unwrap();
        assert_eq!(cd.sampled_alignment(), &[2]);
    }

    #[test]
    fn test_n_samples_drawn_from_rows() {
        let msa = Alignment::from_rows(&[vec![0, 1], vec![1, 1], vec![0, 0]], Alphabet::new(2, None)).unwrap();
        let config = CdConfig {
            n_samples: Some(7),
            ..unregularized()
        };
        let (x, mut cd) =
            ContrastiveDivergence::init_centered(msa, SequenceWeights::uniform(3), config, Frozen).unwrap();
        assert_eq!(cd.n_samples(), 7);
        cd.evaluate(&x).unwrap();
        let sampled = cd.sampled_alignment().to_vec();
        assert_eq!(sampled.len(), 14);
        for row in sampled.chunks_exact(2) {
            assert!(cd.alignment().rows().any(|r| r == row));
        }
    }

    #[test]
    fn test_centered_start() {
        let msa = Alignment::from_rows(&[vec![0], vec![0], vec![1]], Alphabet::new(2, None)).unwrap();
        let (x, cd) =
            ContrastiveDivergence::init_centered(msa, SequenceWeights::uniform(3), CdConfig::default(), Frozen)
                .unwrap();
        // ln(3/5) - ln(2/5) split around the column mean
        let expected = 0.5 * (1.5f64).ln();
        assert!((x[0] - expected).abs() < 1e-12);
        assert!((x[1] + expected).abs() < 1e-12);
        assert!(x[2..].iter().all(|&v| v == 0.0));
        assert_eq!(cd.regularization().center().values, x[..2].to_vec());
    }

    #[test]
    fn test_gibbs_objective_gradient_symmetric() {
        let rows: Vec<Vec<u8>> = (0..12).map(|r| (0..5).map(|c| ((r * 7 + c * 3) % 21) as u8).collect()).collect();
        let msa = Alignment::from_rows(&rows, Alphabet::amino_acids()).unwrap();
        let weights = SequenceWeights::by_identity(&msa, 0.8);
        let sampler = GibbsSampler::new(msa.alphabet(), SamplerConfig::default());
        let (x, mut cd) = ContrastiveDivergence::init_centered(msa, weights, CdConfig::default(), sampler).unwrap();
        let eval = cd.evaluate(&x).unwrap();
        let layout = cd.layout();
        assert_eq!(eval.gradient.len(), layout.len());
        assert!(layout.pair_asymmetry(&eval.gradient[layout.single_len()..]) < 1e-9);
        assert!(eval.value.is_finite());
    }

    #[test]
    fn test_wrong_parameter_length() {
        let msa = Alignment::from_rows(&[vec![0, 1]], Alphabet::new(2, None)).unwrap();
        let (x, mut cd) =
            ContrastiveDivergence::init_centered(msa, SequenceWeights::uniform(1), CdConfig::default(), Frozen)
                .unwrap();
        let err = cd.evaluate(&x[1..]).unwrap_err();
        assert!(matches!(err, PottsError::ShapeViolation { .. }));
    }
}
