//! Nested parameter groups for cascade configuration.
//!
//! These structs are shared by the high-level [`CascadeConfig`](super::CascadeConfig),
//! the trainers, and the persisted stage header:
//! - [`StageParams`]: targets and limits of one boosted stage
//! - [`MiningParams`]: hard-negative replenishment between stages

use serde::{Deserialize, Serialize};

use crate::repr::MAX_TREE_DEPTH;
use crate::training::BoostType;

// =============================================================================
// StageParams
// =============================================================================

/// Training targets of one boosted stage.
///
/// Stored with every stage of a persisted cascade.
///
/// # Example
///
/// ```
/// use cascadeboost::model::StageParams;
/// use cascadeboost::training::BoostType;
///
/// let params = StageParams {
///     boost_type: BoostType::Real,
///     max_weak_count: 50,
///     ..Default::default()
/// };
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageParams {
    /// Boosting variant. Default: `Gentle`.
    pub boost_type: BoostType,

    /// Fraction of positives every stage must accept. Default: 0.995.
    pub min_tar: f32,

    /// Stage stops adding trees once its false-accept rate is at most this.
    /// Default: 0.5.
    pub max_far: f32,

    /// Share of total weight that participates in each tree fit. Default: 0.95.
    ///
    /// Values of 0 or 1 disable trimming.
    pub weight_trim_rate: f32,

    /// Maximum tree depth (1 = stumps), at most [`MAX_TREE_DEPTH`]. Default: 1.
    pub max_depth: u32,

    /// Tree budget per stage. Default: 100.
    pub max_weak_count: u32,
}

impl Default for StageParams {
    fn default() -> Self {
        Self {
            boost_type: BoostType::Gentle,
            min_tar: 0.995,
            max_far: 0.5,
            weight_trim_rate: 0.95,
            max_depth: 1,
            max_weak_count: 100,
        }
    }
}

impl StageParams {
    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns error if a rate is outside its range, a count is zero or the
    /// depth exceeds what the native format stores.
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if !(self.min_tar > 0.0 && self.min_tar < 1.0) {
            return Err(ParamValidationError::InvalidMinTar(self.min_tar));
        }
        if !(self.max_far > 0.0 && self.max_far < 1.0) {
            return Err(ParamValidationError::InvalidMaxFar(self.max_far));
        }
        if !(0.0..=1.0).contains(&self.weight_trim_rate) {
            return Err(ParamValidationError::InvalidWeightTrimRate(self.weight_trim_rate));
        }
        if self.max_depth == 0 || self.max_depth as usize > MAX_TREE_DEPTH {
            return Err(ParamValidationError::InvalidMaxDepth(self.max_depth));
        }
        if self.max_weak_count == 0 {
            return Err(ParamValidationError::InvalidMaxWeakCount(self.max_weak_count));
        }
        Ok(())
    }
}

// =============================================================================
// MiningParams
// =============================================================================

/// Hard-negative mining between stages.
///
/// Every negative the cascade rejects frees a slot; the slot is refilled with
/// a fresh draw the cascade still accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MiningParams {
    /// Draws attempted per free slot before giving up on it. Default: 1000.
    pub max_draws_per_slot: usize,
}

impl Default for MiningParams {
    fn default() -> Self {
        Self { max_draws_per_slot: 1000 }
    }
}

impl MiningParams {
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if self.max_draws_per_slot == 0 {
            return Err(ParamValidationError::InvalidMaxDraws(self.max_draws_per_slot));
        }
        Ok(())
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Parameter validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ParamValidationError {
    #[error("min_tar must be in (0, 1), got {0}")]
    InvalidMinTar(f32),

    #[error("max_far must be in (0, 1), got {0}")]
    InvalidMaxFar(f32),

    #[error("weight_trim_rate must be in [0, 1], got {0}")]
    InvalidWeightTrimRate(f32),

    #[error("max_depth must be in [1, {max}], got {0}", max = MAX_TREE_DEPTH)]
    InvalidMaxDepth(u32),

    #[error("max_weak_count must be > 0, got {0}")]
    InvalidMaxWeakCount(u32),

    #[error("max_draws_per_slot must be > 0, got {0}")]
    InvalidMaxDraws(usize),
}
