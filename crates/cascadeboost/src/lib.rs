//! cascadeboost: cascaded boosted decision trees for object detection.
//!
//! Trains Viola-Jones style detectors: a chain of boosted stages, each
//! rejecting most of the remaining negatives while keeping almost every
//! positive. Feature extraction is pluggable through [`Representation`].
//!
//! # Key Types
//!
//! - [`CascadeModel`] - High-level model with train/classify/store/load
//! - [`CascadeConfig`] - Configuration builder
//! - [`Cascade`] / [`BoostedStage`] / [`WeakTree`] - Frozen inference types
//! - [`FeatureCache`] - Cached feature responses of the training pool
//!
//! # Training
//!
//! Use `CascadeConfig::builder()` to configure, then `CascadeModel::train()`.
//! Lower-level control is available through [`training::CascadeTrainer`] and
//! [`training::StageTrainer`].
//!
//! # Persistence
//!
//! Cascades are stored in a checksummed little-endian format, see [`io`].

pub mod data;
pub mod io;
pub mod model;
pub mod repr;
pub mod testing;
pub mod training;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use model::{CascadeConfig, CascadeModel, ConfigError, MiningParams, StageParams, TrainError};

pub use repr::{BoostedStage, Cascade, Classification, WeakTree};

pub use training::{BoostType, SplitCriterion, Verbosity};

pub use data::{FeatureCache, Label, NegativeSource, RandomWindows, Representation, SampleAccessor};

pub use utils::{Parallelism, run_with_threads};
