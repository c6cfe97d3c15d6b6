//! # Sequence Sampler
//!
//! ## Role
//! The negative-phase sampler of contrastive divergence: rows of a categorical
//! buffer are redrawn position by position from the Potts conditional
//! distribution given the rest of the row (Gibbs update).
//!
//! ## Boundary
//! [`SequenceSampler::sample`] takes the mutable buffer, its row and column
//! counts and the flattened parameter vector, and mutates the buffer in
//! place. Objectives only talk to this trait, so tests can substitute a
//! deterministic sampler.
//!
//! ## Gibbs Schedule
//! - Rows are independent given `x` and are processed in parallel.
//! - Each sweep visits every column once, in a fresh random permutation.
//! - `SamplerConfig::n_sweeps` sweeps are run per call.
//! - Every row draws from its own RNG stream derived from
//!   `(seed, call counter, row index)`, so a run is reproducible for a given
//!   seed regardless of thread scheduling.
//! - Cells holding the gap symbol are frozen and gaps are never drawn.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use mini_mcmc::core::{MarkovChain, Trace};
use tracing::{debug, instrument, Level};

use crate::data::alphabet::Alphabet;
use crate::error::{PottsError, Result};
use crate::model::parameters::ParameterLayout;

/// Default number of Gibbs sweeps per sampler call
pub const DEFAULT_SWEEPS: usize = 1;

/// Default RNG seed
pub const DEFAULT_SEED: u64 = 42;

/// Draws negative-phase sequences for the current parameters.
pub trait SequenceSampler: Send {
    /// Resample `buffer` (`n_rows x n_cols`, row-major) in place under `x`.
    ///
    /// A buffer or parameter vector whose shape disagrees with
    /// `(n_rows, n_cols)` and the sampler's alphabet is a `ShapeViolation`.
    fn sample(&mut self, buffer: &mut [u8], n_rows: usize, n_cols: usize, x: &[f64]) -> Result<()>;
}

/// Sampler settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub n_sweeps: usize,
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_sweeps: DEFAULT_SWEEPS,
            seed: DEFAULT_SEED,
        }
    }
}

/// Derive an independent RNG seed for one row or node of one call.
#[inline]
pub(crate) fn stream_seed(seed: u64, epoch: u64, index: u64) -> u64 {
    // splitmix64 finalizer over a combined key
    let mut z = seed
        ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ index.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Check the buffer/parameter shapes shared by every sampler.
pub(crate) fn check_shapes(
    buffer: &[u8],
    n_rows: usize,
    n_cols: usize,
    x: &[f64],
    alphabet: Alphabet,
) -> Result<ParameterLayout> {
    if buffer.len() != n_rows * n_cols {
        return Err(PottsError::shape(format!(
            "sample buffer has {} cells, expected {} x {}",
            buffer.len(),
            n_rows,
            n_cols
        )));
    }
    let layout = ParameterLayout::new(n_cols, alphabet.n_states());
    layout.check(x)?;
    if let Some(pos) = buffer.iter().position(|&c| !alphabet.contains(c)) {
        return Err(PottsError::shape(format!(
            "sample buffer symbol {} at row {} is outside the alphabet of {} states",
            buffer[pos],
            pos / n_cols.max(1),
            alphabet.n_states()
        )));
    }
    Ok(layout)
}

/// Read-only view of Potts parameters for conditional draws.
pub struct PottsModel<'a> {
    layout: ParameterLayout,
    alphabet: Alphabet,
    single: &'a [f64],
    pair: &'a [f64],
}

impl<'a> PottsModel<'a> {
    /// `x` must already be checked against `layout`.
    pub fn new(layout: ParameterLayout, alphabet: Alphabet, x: &'a [f64]) -> Self {
        let (single, pair) = layout.split(x);
        Self {
            layout,
            alphabet,
            single,
            pair,
        }
    }

    pub fn n_cols(&self) -> usize {
        self.layout.n_cols
    }

    /// Sum of single and pair log-potentials of a sequence
    pub fn log_potential(&self, seq: &[u8]) -> f64 {
        let s = self.layout.n_states;
        let mut total = 0.0;
        for (i, &a) in seq.iter().enumerate() {
            total += self.single[i * s + a as usize];
            for (j, &b) in seq.iter().enumerate().skip(i + 1) {
                total += self.pair[self.layout.pair_block(i, j) + a as usize * s + b as usize];
            }
        }
        total
    }

    /// Fill `probs` with `p(a | seq without j)` over drawable symbols.
    ///
    /// The gap symbol, if any, gets probability zero.
    pub fn conditional(&self, seq: &[u8], j: usize, probs: &mut [f64]) {
        let s = self.layout.n_states;
        probs.copy_from_slice(&self.single[j * s..(j + 1) * s]);
        for (k, &b) in seq.iter().enumerate() {
            if k == j {
                continue;
            }
            let block = &self.pair[self.layout.pair_block(j, k)..];
            for (a, p) in probs.iter_mut().enumerate() {
                *p += block[a * s + b as usize];
            }
        }
        if let Some(gap) = self.alphabet.gap() {
            probs[gap as usize] = f64::NEG_INFINITY;
        }

        let max = probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for p in probs.iter_mut() {
            *p = (*p - max).exp();
            sum += *p;
        }
        for p in probs.iter_mut() {
            *p /= sum;
        }
    }

    /// Redraw position `j` of `seq`. Returns whether the symbol changed.
    ///
    /// Gap cells are left untouched.
    pub fn resample_site<R: Rng>(&self, seq: &mut [u8], j: usize, probs: &mut [f64], rng: &mut R) -> bool {
        let old = seq[j];
        if self.alphabet.is_gap(old) {
            return false;
        }
        self.conditional(seq, j, probs);
        let new = sample_categorical(probs, rng) as u8;
        seq[j] = new;
        new != old
    }
}

/// Draw an index from normalized probabilities
fn sample_categorical<R: Rng>(probs: &[f64], rng: &mut R) -> usize {
    let mut threshold = rng.random::<f64>();
    let mut last = 0;
    for (i, &p) in probs.iter().enumerate() {
        if p <= 0.0 {
            continue;
        }
        last = i;
        threshold -= p;
        if threshold < 0.0 {
            return i;
        }
    }
    last
}

/// Per-task scratch space reused across rows
pub(crate) struct SiteScratch {
    pub order: Vec<usize>,
    pub probs: Vec<f64>,
}

impl SiteScratch {
    pub fn new(n_cols: usize, n_states: usize) -> Self {
        Self {
            order: (0..n_cols).collect(),
            probs: vec![0.0; n_states],
        }
    }
}

/// Statistics of the latest sweep of one chain
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepTrace {
    pub n_changed: usize,
    /// Only filled when the chain tracks its potential
    pub log_potential: Option<f64>,
}

impl Trace for SweepTrace {
    fn trace(&self) -> Vec<f64> {
        vec![self.n_changed as f64, self.log_potential.unwrap_or(f64::NAN)]
    }
}

/// A Gibbs Markov chain over a single row.
pub struct GibbsChain<'a> {
    model: &'a PottsModel<'a>,
    seq: &'a mut [u8],
    scratch: &'a mut SiteScratch,
    rng: SmallRng,
    track_potential: bool,
    trace: SweepTrace,
}

impl<'a> GibbsChain<'a> {
    pub(crate) fn new(
        model: &'a PottsModel<'a>,
        seq: &'a mut [u8],
        scratch: &'a mut SiteScratch,
        seed: u64,
    ) -> Self {
        Self {
            model,
            seq,
            scratch,
            rng: SmallRng::seed_from_u64(seed),
            track_potential: false,
            trace: SweepTrace::default(),
        }
    }

    /// Record the O(L²) log-potential of the row after every sweep.
    pub fn tracking_potential(mut self, track: bool) -> Self {
        self.track_potential = track;
        self
    }

    /// Log-potential of the current row, computed on demand
    pub fn log_potential(&self) -> f64 {
        self.model.log_potential(self.seq)
    }
}

impl MarkovChain<SweepTrace> for GibbsChain<'_> {
    /// One full sweep over all columns in random order
    fn step(&mut self) -> &SweepTrace {
        self.scratch.order.shuffle(&mut self.rng);
        let mut n_changed = 0;
        for &j in &self.scratch.order {
            if self
                .model
                .resample_site(self.seq, j, &mut self.scratch.probs, &mut self.rng)
            {
                n_changed += 1;
            }
        }
        self.trace.n_changed = n_changed;
        self.trace.log_potential = self.track_potential.then(|| self.model.log_potential(&*self.seq));
        &self.trace
    }

    fn current_state(&self) -> &SweepTrace {
        &self.trace
    }
}

/// Run `n_sweeps` steps of a chain, returning the total number of changed sites.
fn run_sweeps<C: MarkovChain<SweepTrace>>(chain: &mut C, n_sweeps: usize) -> usize {
    (0..n_sweeps).map(|_| chain.step().n_changed).sum()
}

/// Parallel Gibbs sampler over independent rows.
#[derive(Clone, Debug)]
pub struct GibbsSampler {
    alphabet: Alphabet,
    config: SamplerConfig,
    epoch: u64,
}

impl GibbsSampler {
    pub fn new(alphabet: Alphabet, config: SamplerConfig) -> Self {
        Self {
            alphabet,
            config,
            epoch: 0,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Number of completed `sample` calls
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl SequenceSampler for GibbsSampler {
    #[instrument(name = "gibbs_sample", skip_all, fields(n_rows = n_rows, n_cols = n_cols))]
    fn sample(&mut self, buffer: &mut [u8], n_rows: usize, n_cols: usize, x: &[f64]) -> Result<()> {
        let layout = check_shapes(buffer, n_rows, n_cols, x, self.alphabet)?;
        if n_rows == 0 || n_cols == 0 {
            return Ok(());
        }
        let model = PottsModel::new(layout, self.alphabet, x);
        let (seed, epoch, n_sweeps) = (self.config.seed, self.epoch, self.config.n_sweeps);
        let track = tracing::enabled!(Level::DEBUG);

        let (n_changed, total_potential) = buffer
            .par_chunks_mut(n_cols)
            .enumerate()
            .map_init(
                || SiteScratch::new(n_cols, layout.n_states),
                |scratch, (row, seq)| {
                    let mut chain = GibbsChain::new(&model, seq, scratch, stream_seed(seed, epoch, row as u64))
                        .tracking_potential(track);
                    let n_changed = run_sweeps(&mut chain, n_sweeps);
                    (n_changed, chain.current_state().log_potential.unwrap_or(0.0))
                },
            )
            .reduce(|| (0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

        self.epoch += 1;
        if track {
            let mean_log_potential = total_potential / n_rows as f64;
            debug!(epoch, n_rows, n_changed, mean_log_potential, "gibbs sweeps complete");
        }
        Ok(())
    }
}
