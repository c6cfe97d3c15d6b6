//! # Data Module
//!
//! In-memory representations of alignments, sequence weights and trees.
//!
//! ## Design Philosophy
//! - **Flat row-major buffers:** alignments are a single `Vec<u8>` of
//!   `n_rows * n_cols` symbol codes so rows can be handed to rayon as
//!   contiguous chunks.
//! - **Immutable inputs:** `Alignment`, `SequenceWeights` and `Tree` are built
//!   once by the I/O layer and only read afterwards.

pub mod alignment;
pub mod alphabet;
pub mod tree;
pub mod weights;

// Re-export commonly used types
pub use alignment::Alignment;
pub use alphabet::Alphabet;
pub use tree::{Clade, Tree, TreeTopology};
pub use weights::SequenceWeights;
