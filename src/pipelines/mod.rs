//! # Pipeline Module
//!
//! High-level orchestration of training runs. Coordinates I/O, sequence
//! weighting, objective construction and the optimizer loop.

pub mod training;

pub use training::{GradientDescent, IterationRecord, RunSummary, TrainingConfig, TrainingPipeline};
