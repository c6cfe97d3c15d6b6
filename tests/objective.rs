//! End-to-end checks of the contrastive divergence objective through the
//! public API: mock samplers, Gibbs and tree sampling, and the CLI pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use potts_cd::data::tree::{Clade, Tree, TreeTopology};
use potts_cd::io::raw::{read_raw, write_raw};
use potts_cd::model::regularization::{Regularization, SingleCenter};
use potts_cd::{
    Alignment, Alphabet, CdConfig, Config, ContrastiveDivergence, GibbsSampler, Objective, ParameterLayout,
    PottsError, RawParameters, RegularizationConfig, Result, RunSummary, SamplerConfig, SequenceSampler,
    SequenceWeights, TrainingPipeline, ValueKind,
};

/// Returns the buffer unchanged and counts invocations
#[derive(Clone, Default)]
struct CountingIdentity {
    calls: Arc<AtomicUsize>,
}

impl SequenceSampler for CountingIdentity {
    fn sample(&mut self, _buffer: &mut [u8], _n_rows: usize, _n_cols: usize, _x: &[f64]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn no_regularization() -> CdConfig {
    CdConfig {
        regularization: RegularizationConfig::none(),
        ..CdConfig::default()
    }
}

#[test]
fn identity_sampler_gives_zero_single_gradient() {
    let msa = Alignment::from_rows(&[vec![1], vec![1], vec![1], vec![1]], Alphabet::new(2, None)).unwrap();
    let sampler = CountingIdentity::default();
    let calls = sampler.calls.clone();
    let (x, mut objective) = ContrastiveDivergence::init_from_raw(
        msa,
        SequenceWeights::uniform(4),
        &RawParameters::zeros(1, 2),
        no_regularization(),
        sampler,
    )
    .unwrap();

    let eval = objective.evaluate(&x).unwrap();
    let layout = objective.layout();
    assert!(eval.gradient[..layout.single_len()].iter().all(|&g| g == 0.0));
    assert_eq!(eval.kind, ValueKind::MismatchProxy);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn column_mismatch_reported_before_sampling() {
    let msa = Alignment::from_rows(&[vec![0, 1, 1], vec![1, 0, 1]], Alphabet::new(2, None)).unwrap();
    let sampler = CountingIdentity::default();
    let calls = sampler.calls.clone();
    let result = ContrastiveDivergence::init_from_raw(
        msa,
        SequenceWeights::uniform(2),
        &RawParameters::zeros(4, 2),
        CdConfig::default(),
        sampler,
    );
    assert!(matches!(
        result,
        Err(PottsError::ColumnMismatch { expected: 3, found: 4, .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn raw_pair_axes_are_transposed_on_flatten() {
    let (l, s) = (2, 3);
    let layout = ParameterLayout::new(l, s);
    let mut raw = RawParameters::zeros(l, s);
    // raw axes are (i, a, j, b)
    let (i, a, j, b) = (0, 1, 1, 2);
    raw.x_pair[((i * s + a) * l + j) * s + b] = 7.0;
    let x = raw.flatten();
    assert_eq!(x[layout.single_len() + layout.pair_index(i, j, a, b)], 7.0);
    assert_eq!(RawParameters::from_flat(layout, &x).unwrap(), raw);
}

#[test]
fn gibbs_objective_gradient_is_symmetric() {
    let rows: Vec<Vec<u8>> = (0..20)
        .map(|r| (0..6).map(|c| ((r * 5 + c * c + r * c) % 21) as u8).collect())
        .collect();
    let msa = Alignment::from_rows(&rows, Alphabet::amino_acids()).unwrap();
    let weights = SequenceWeights::by_identity(&msa, 0.8);
    let sampler = GibbsSampler::new(msa.alphabet(), SamplerConfig { n_sweeps: 2, seed: 7 });
    let (mut x, mut objective) = ContrastiveDivergence::init_centered(msa, weights, CdConfig::default(), sampler).unwrap();

    let layout = objective.layout();
    // symmetric nonzero couplings
    for i in 0..6 {
        for j in 0..6 {
            if i != j {
                x[layout.single_len() + layout.pair_index(i, j, (i + j) % 21, (2 * i + j) % 21)] += 0.3;
                x[layout.single_len() + layout.pair_index(j, i, (2 * i + j) % 21, (i + j) % 21)] += 0.3;
            }
        }
    }
    assert!(layout.pair_asymmetry(&x[layout.single_len()..]) < 1e-12);

    for _ in 0..3 {
        let eval = objective.evaluate(&x).unwrap();
        assert!(layout.pair_asymmetry(&eval.gradient[layout.single_len()..]) < 1e-9);
        assert!(eval.value.is_finite());
        assert!(eval.penalty >= 0.0);
    }

    // sampled alignment keeps shape and alphabet
    let sampled = objective.sampled_alignment();
    assert_eq!(sampled.len(), 20 * 6);
    assert!(sampled.iter().all(|&c| c < 21));
}

#[test]
fn l3_with_constant_matrix_matches_l2() {
    let layout = ParameterLayout::new(3, 4);
    let x: Vec<f64> = (0..layout.len()).map(|k| ((k * 37) % 11) as f64 * 0.1 - 0.5).collect();
    let (x_single, x_pair) = layout.split(&x);
    let center = SingleCenter::zeros(layout);

    let l2 = Regularization::l2(layout, 0.3, 0.2, 2.0, center.clone()).unwrap();
    let l3 = Regularization::l3(layout, 0.3, 0.2, 2.0, center, vec![l2.lambda_pair(); layout.pair_len()]).unwrap();
    assert_eq!(
        l2.penalty_and_gradient(x_single, x_pair),
        l3.penalty_and_gradient(x_single, x_pair)
    );
}

#[test]
fn tree_bfs_order_matches_child_insertion() {
    // root -> (a, b), a -> (c, d), c -> (e, f)
    let tree = Tree::new(Clade::with_children(
        0.0,
        vec![
            Clade::with_children(
                0.1,
                vec![
                    Clade::with_children(0.2, vec![Clade::leaf("e", 0.3), Clade::leaf("f", 0.3)]),
                    Clade::leaf("d", 0.2),
                ],
            ),
            Clade::leaf("b", 0.1),
        ],
    ));
    let topology = TreeTopology::from_tree(&tree).unwrap();
    assert_eq!(topology.n_children, vec![2, 2, 0, 2, 0, 0, 0]);
    assert_eq!(topology.n_nodes(), 7);
    assert_eq!(topology.branch_lengths[0], 0.0);
}

#[test]
fn tree_guided_objective_evaluates() {
    let tree = Tree::new(Clade::with_children(
        0.0,
        vec![
            Clade::with_children(0.4, vec![Clade::leaf("a", 0.4), Clade::leaf("b", 0.4)]),
            Clade::with_children(0.4, vec![Clade::leaf("c", 0.4), Clade::leaf("d", 0.4)]),
        ],
    ));
    let msa = Alignment::from_rows(
        &[vec![0, 3, 5, 20], vec![1, 3, 5, 20], vec![0, 4, 6, 20]],
        Alphabet::amino_acids(),
    )
    .unwrap();
    let raw = RawParameters::zeros(4, 21);
    let (x, mut objective) =
        ContrastiveDivergence::tree_guided(msa, &tree, 0, SequenceWeights::uniform(3), &raw, CdConfig::default())
            .unwrap();
    assert_eq!(objective.n_children(), &[2, 2, 2, 0, 0, 0, 0]);

    let eval = objective.evaluate(&x).unwrap();
    let layout = objective.layout();
    assert_eq!(eval.gradient.len(), layout.len());
    assert!(layout.pair_asymmetry(&eval.gradient[layout.single_len()..]) < 1e-12);
    // the gap column of the root is carried to every leaf
    assert!(objective.sampled_alignment().chunks_exact(4).all(|row| row[3] == 20));
}

#[test]
fn training_pipeline_writes_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let msa_path = dir.path().join("family.psc");
    let out_path = dir.path().join("family.raw");
    let init_path = dir.path().join("init.raw");
    std::fs::write(&msa_path, "ARNDC\nARNDA\nGRNDC\nARQDC\n").unwrap();
    write_raw(&init_path, &RawParameters::zeros(5, 21)).unwrap();

    let config = Config::try_parse_from([
        "potts-cd",
        "--msa",
        msa_path.to_str().unwrap(),
        "--init",
        init_path.to_str().unwrap(),
        "--out",
        out_path.to_str().unwrap(),
        "--iterations",
        "3",
        "--lambda-single",
        "0.01",
    ])
    .unwrap();
    config.validate().unwrap();

    let history = TrainingPipeline::new(config).run().unwrap();
    assert_eq!(history.len(), 3);
    let raw = read_raw(&out_path).unwrap();
    assert_eq!((raw.n_cols, raw.n_states), (5, 21));
    assert!(raw.x_single.iter().chain(&raw.x_pair).all(|v| v.is_finite()));

    let summary = RunSummary::read(&dir.path().join("family.raw.json")).unwrap();
    assert_eq!(summary.history, history);
    assert_eq!(summary.training.iterations, 3);
    assert_eq!(summary.cd.regularization.lambda_single, 0.01);
    assert_eq!(summary.layout, ParameterLayout::new(5, 21));
    assert!(summary.tree.is_none());
}

#[test]
fn tree_leaf_count_policy() {
    let tree = Tree::new(Clade::with_children(0.0, vec![Clade::leaf("a", 1.0), Clade::leaf("b", 1.0)]));
    let msa = Alignment::from_rows(&[vec![0, 1], vec![1, 0]], Alphabet::new(2, None)).unwrap();
    let config = CdConfig {
        n_samples: Some(3),
        ..CdConfig::default()
    };
    let result = ContrastiveDivergence::tree_guided(
        msa,
        &tree,
        0,
        SequenceWeights::uniform(2),
        &RawParameters::zeros(2, 2),
        config,
    );
    assert!(matches!(result, Err(PottsError::DegenerateTree { leaves: 2, samples: 3 })));
}
