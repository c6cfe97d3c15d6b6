//! # Utilities Module
//!
//! ## Role
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `threading`: Rayon thread pool configuration
//! - `workspace`: Pre-allocated sample buffers reused across evaluations

pub mod threading;
pub mod workspace;
