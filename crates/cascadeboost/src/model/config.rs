//! High-level cascade configuration with builder pattern.
//!
//! [`CascadeConfig`] groups the cascade budget, the per-stage [`StageParams`],
//! mining and resource settings. The `bon` builder validates on `build()`.
//!
//! # Example
//!
//! ```
//! use cascadeboost::model::{CascadeConfig, MiningParams, StageParams};
//! use cascadeboost::training::BoostType;
//!
//! let config = CascadeConfig::builder()
//!     .n_stages(10)
//!     .stage(StageParams { boost_type: BoostType::Real, max_depth: 2, ..Default::default() })
//!     .mining(MiningParams::default())
//!     .build()
//!     .unwrap();
//! assert_eq!(config.n_stages, 10);
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;

use bon::Builder;

use super::params::{MiningParams, ParamValidationError, StageParams};
use crate::training::{CascadeParams, SplitCriterion, Verbosity};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("n_stages must be at least 1")]
    InvalidNStages,

    #[error("cascade max_far must be in (0, 1), got {0}")]
    InvalidMaxFar(f32),

    #[error("min_samples_leaf must be at least 1")]
    InvalidMinSamplesLeaf,

    #[error("threshold_epsilon must be finite and non-negative, got {0}")]
    InvalidEpsilon(f32),

    #[error("invalid stage parameters: {0}")]
    InvalidStage(#[from] ParamValidationError),

    #[error("mining parameters invalid: {0}")]
    InvalidMining(#[source] ParamValidationError),

    #[error("{n_samples} samples but {n_labels} labels")]
    LengthMismatch { n_samples: usize, n_labels: usize },

    #[error("representation exposes no features")]
    NoFeatures,
}

// =============================================================================
// CascadeConfig
// =============================================================================

/// Configuration for cascade training.
///
/// # Structure
///
/// - **Cascade**: `n_stages` and the cumulative `max_far` budget
/// - **Stage**: boosting variant and per-stage targets via [`StageParams`]
/// - **Trees**: split criterion and minimum leaf size
/// - **Pool**: response cache budget and optional hard-negative [`MiningParams`]
/// - **Inference**: `roc_mode` for graded confidences
/// - **Resources**: threads, seed, logging and checkpointing
#[derive(Debug, Clone, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct CascadeConfig {
    // === Cascade ===
    /// Maximum number of stages. Default: 20.
    #[builder(default = 20)]
    pub n_stages: u32,

    /// Cumulative false-accept budget. Default: 0.005.
    #[builder(default = 0.005)]
    pub max_far: f32,

    // === Stage ===
    #[builder(default)]
    pub stage: StageParams,

    // === Trees ===
    /// Node impurity. `None` picks the boosting variant's default.
    pub split_criterion: Option<SplitCriterion>,

    /// Minimum samples per leaf. Default: 1.
    #[builder(default = 1)]
    pub min_samples_leaf: u32,

    /// Tolerance used when counting scores at the stage threshold.
    #[builder(default = f32::EPSILON)]
    pub threshold_epsilon: f32,

    // === Pool ===
    /// Maximum number of cached responses. `None` caches every feature.
    pub precompute_budget: Option<usize>,

    /// Refill rejected negatives between stages. `None` only filters.
    pub mining: Option<MiningParams>,

    // === Inference ===
    /// Graded confidences for rejected samples instead of `-1`.
    #[builder(default)]
    pub roc_mode: bool,

    // === Resources ===
    /// Number of threads. `None` uses all available cores.
    pub n_threads: Option<NonZeroUsize>,

    /// Seed of the mining RNG. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,

    /// Store the cascade here after every trained stage.
    pub checkpoint: Option<PathBuf>,
}

impl<S: cascade_config_builder::IsComplete> CascadeConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any out-of-range parameter.
    pub fn build(self) -> Result<CascadeConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl CascadeConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.to_trainer_params().validate()
    }

    /// Number of worker threads, 0 meaning all cores.
    pub fn n_threads(&self) -> usize {
        self.n_threads.map_or(0, NonZeroUsize::get)
    }

    /// Convert to trainer-level parameters.
    pub fn to_trainer_params(&self) -> CascadeParams {
        CascadeParams {
            n_stages: self.n_stages,
            max_far: self.max_far,
            stage: self.stage.clone(),
            split_criterion: self.split_criterion,
            min_samples_leaf: self.min_samples_leaf,
            threshold_epsilon: self.threshold_epsilon,
            precompute_budget: self.precompute_budget,
            mining: self.mining,
            seed: self.seed,
            verbosity: self.verbosity,
            checkpoint: self.checkpoint.clone(),
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::BoostType;
    use rstest::rstest;

    #[test]
    fn default_config_is_valid() {
        let config = CascadeConfig::default();
        assert_eq!(config.n_stages, 20);
        assert_eq!(config.max_far, 0.005);
        assert_eq!(config.stage, StageParams::default());
        assert_eq!(config.min_samples_leaf, 1);
        assert_eq!(config.seed, 42);
        assert_eq!(config.n_threads(), 0);
        assert!(!config.roc_mode);
        assert!(config.mining.is_none());
    }

    #[test]
    fn zero_weak_count_is_rejected() {
        let result = CascadeConfig::builder()
            .stage(StageParams { max_weak_count: 0, ..Default::default() })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidStage(ParamValidationError::InvalidMaxWeakCount(0)))
        ));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.5)]
    #[case(f32::NAN)]
    fn cascade_far_outside_unit_interval(#[case] max_far: f32) {
        let result = CascadeConfig::builder().max_far(max_far).build();
        assert!(matches!(result, Err(ConfigError::InvalidMaxFar(_))));
    }

    #[test]
    fn scalar_checks() {
        assert_eq!(CascadeConfig::builder().n_stages(0).build().unwrap_err(), ConfigError::InvalidNStages);
        assert_eq!(
            CascadeConfig::builder().min_samples_leaf(0).build().unwrap_err(),
            ConfigError::InvalidMinSamplesLeaf
        );
        assert!(matches!(
            CascadeConfig::builder().threshold_epsilon(-1.0).build(),
            Err(ConfigError::InvalidEpsilon(_))
        ));
        assert!(matches!(
            CascadeConfig::builder().mining(MiningParams { max_draws_per_slot: 0 }).build(),
            Err(ConfigError::InvalidMining(ParamValidationError::InvalidMaxDraws(0)))
        ));
    }

    #[test]
    fn trainer_params_carry_every_field() {
        let config = CascadeConfig::builder()
            .n_stages(3)
            .max_far(0.01)
            .stage(StageParams { boost_type: BoostType::Logit, ..Default::default() })
            .split_criterion(SplitCriterion::Gini)
            .precompute_budget(1024)
            .mining(MiningParams { max_draws_per_slot: 7 })
            .seed(9)
            .verbosity(Verbosity::Debug)
            .checkpoint(PathBuf::from("stage.vjcb"))
            .build()
            .unwrap();

        let params = config.to_trainer_params();
        assert_eq!(params.n_stages, 3);
        assert_eq!(params.max_far, 0.01);
        assert_eq!(params.stage.boost_type, BoostType::Logit);
        assert_eq!(params.split_criterion, Some(SplitCriterion::Gini));
        assert_eq!(params.precompute_budget, Some(1024));
        assert_eq!(params.mining, Some(MiningParams { max_draws_per_slot: 7 }));
        assert_eq!(params.seed, 9);
        assert_eq!(params.verbosity, Verbosity::Debug);
        assert_eq!(params.checkpoint.as_deref(), Some(std::path::Path::new("stage.vjcb")));
    }
}
