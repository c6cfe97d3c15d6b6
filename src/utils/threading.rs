//! # Threading Configuration
//!
//! Configure the rayon pool used by the samplers and statistics.

use crate::error::{PottsError, Result};

/// Resolve a requested thread count, `0` meaning all available cores.
pub fn resolve_threads(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism().map_or(1, |n| n.get())
    }
}

/// Install the global rayon pool.
///
/// Fails if a global pool has already been built.
pub fn build_global_pool(n_threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("potts-worker-{}", i))
        .build_global()
        .map_err(|e| PottsError::config(format!("Failed to create thread pool: {}", e)))
}
