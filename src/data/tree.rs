//! # Phylogenetic Tree
//!
//! ## Role
//! Rooted, ordered tree of clades plus its flattened breadth-first topology.
//!
//! ## BFS Layout
//! `TreeTopology` stores one entry per node in breadth-first order: the root
//! first, then every level left to right, children in insertion order. With
//! that order the children of any node occupy a contiguous index range and
//! every level is a contiguous block, which lets the tree sampler process one
//! level in parallel while reading the previous one.
//!
//! ```text
//!          root                n_children = [2, 2, 2, 0, 0, 0, 0]
//!        /      \              levels     = [0..1, 1..3, 3..7]
//!       a        b
//!      / \      / \
//!    a1   a2  b1   b2
//! ```

use std::collections::VecDeque;
use std::ops::Range;

use crate::error::{PottsError, Result};

/// A node of the tree together with its descendants.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Clade {
    pub name: Option<String>,
    /// Expected mutational distance from the parent. Ignored on the root.
    pub branch_length: f64,
    /// Ordered children
    pub clades: Vec<Clade>,
}

impl Clade {
    /// A childless clade
    pub fn leaf(name: impl Into<String>, branch_length: f64) -> Self {
        Self {
            name: Some(name.into()),
            branch_length,
            clades: Vec::new(),
        }
    }

    /// An internal clade with ordered children
    pub fn with_children(branch_length: f64, clades: Vec<Clade>) -> Self {
        Self {
            name: None,
            branch_length,
            clades,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.clades.is_empty()
    }
}

/// A rooted tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    pub root: Clade,
}

impl Tree {
    pub fn new(root: Clade) -> Self {
        Self { root }
    }

    /// Leaves in depth-first, left-to-right order
    pub fn leaves(&self) -> Vec<&Clade> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(clade) = stack.pop() {
            if clade.is_leaf() {
                out.push(clade);
            } else {
                stack.extend(clade.clades.iter().rev());
            }
        }
        out
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.bfs().iter().filter(|c| c.is_leaf()).count()
    }

    /// Clades in breadth-first order, root first, children in insertion order.
    pub fn bfs(&self) -> Vec<&Clade> {
        let mut order = Vec::new();
        let mut queue = VecDeque::from([&self.root]);
        while let Some(clade) = queue.pop_front() {
            order.push(clade);
            queue.extend(clade.clades.iter());
        }
        order
    }
}

/// Breadth-first flattened tree, see the module docs.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeTopology {
    /// Number of children per node
    pub n_children: Vec<usize>,
    /// Branch length per node (root is 0)
    pub branch_lengths: Vec<f64>,
    /// Parent index per node (root points at itself)
    pub parent: Vec<usize>,
    /// Output row for leaves, in BFS order of leaves
    pub leaf_row: Vec<Option<usize>>,
    /// Contiguous node ranges, one per depth
    pub levels: Vec<Range<usize>>,
}

impl TreeTopology {
    /// Flatten a tree. Branch lengths must be finite and non-negative.
    pub fn from_tree(tree: &Tree) -> Result<Self> {
        let mut n_children = Vec::new();
        let mut branch_lengths = Vec::new();
        let mut parent = Vec::new();
        let mut leaf_row = Vec::new();
        let mut levels = Vec::new();

        let mut queue: VecDeque<(&Clade, usize, usize)> = VecDeque::from([(&tree.root, 0, 0)]);
        let mut n_leaves = 0;
        let mut level_start = 0;
        let mut current_depth = 0;

        while let Some((clade, parent_idx, depth)) = queue.pop_front() {
            let idx = n_children.len();
            if depth != current_depth {
                levels.push(level_start..idx);
                level_start = idx;
                current_depth = depth;
            }

            let length = if idx == 0 { 0.0 } else { clade.branch_length };
            if !length.is_finite() || length < 0.0 {
                return Err(PottsError::invalid_data(format!(
                    "branch length {} at node {} must be finite and non-negative",
                    clade.branch_length, idx
                )));
            }

            n_children.push(clade.clades.len());
            branch_lengths.push(length);
            parent.push(parent_idx);
            if clade.is_leaf() {
                leaf_row.push(Some(n_leaves));
                n_leaves += 1;
            } else {
                leaf_row.push(None);
            }
            queue.extend(clade.clades.iter().map(|c| (c, idx, depth + 1)));
        }
        levels.push(level_start..n_children.len());

        Ok(Self {
            n_children,
            branch_lengths,
            parent,
            leaf_row,
            levels,
        })
    }

    /// Number of nodes
    pub fn n_nodes(&self) -> usize {
        self.n_children.len()
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.n_children.iter().filter(|&&n| n == 0).count()
    }
}
