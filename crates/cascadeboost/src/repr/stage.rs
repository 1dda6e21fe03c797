//! Boosted stage: an additive ensemble of weak trees with a decision threshold.

use crate::data::SampleAccessor;
use crate::model::StageParams;

use super::{TreeValidationError, TreeView, WeakTree};

/// Structural errors of a [`BoostedStage`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageValidationError {
    #[error("stage has no trees")]
    EmptyStage,

    #[error("stage threshold {0} is not finite")]
    NonFiniteThreshold(f32),

    #[error("tree {tree}: {source}")]
    Tree {
        tree: usize,
        #[source]
        source: TreeValidationError,
    },
}

/// One trained cascade stage.
///
/// The stage score of a sample is the sum of its leaf values over all trees;
/// the sample is accepted when that sum reaches [`threshold`](Self::threshold).
#[derive(Debug, Clone, PartialEq)]
pub struct BoostedStage {
    params: StageParams,
    trees: Vec<WeakTree>,
    threshold: f32,
}

impl BoostedStage {
    /// A stage always holds at least one tree.
    pub fn new(params: StageParams, trees: Vec<WeakTree>, threshold: f32) -> Self {
        debug_assert!(!trees.is_empty(), "a stage needs at least one tree");
        Self { params, trees, threshold }
    }

    #[inline]
    pub fn params(&self) -> &StageParams {
        &self.params
    }

    #[inline]
    pub fn trees(&self) -> &[WeakTree] {
        &self.trees
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Unthresholded sum of leaf votes, accumulated in tree order.
    pub fn raw_score<S: SampleAccessor + ?Sized>(&self, sample: &S) -> f32 {
        debug_assert!(!self.trees.is_empty(), "predict on an empty stage");
        self.trees.iter().map(|tree| tree.predict(sample) as f64).sum::<f64>() as f32
    }

    /// `raw_score - threshold`; non-negative means accept.
    #[inline]
    pub fn decision<S: SampleAccessor + ?Sized>(&self, sample: &S) -> f32 {
        self.raw_score(sample) - self.threshold
    }

    #[inline]
    pub fn accepts<S: SampleAccessor + ?Sized>(&self, sample: &S) -> bool {
        self.decision(sample) >= 0.0
    }

    pub fn validate(&self) -> Result<(), StageValidationError> {
        if self.trees.is_empty() {
            return Err(StageValidationError::EmptyStage);
        }
        if !self.threshold.is_finite() {
            return Err(StageValidationError::NonFiniteThreshold(self.threshold));
        }
        for (tree, weak) in self.trees.iter().enumerate() {
            weak.validate().map_err(|source| StageValidationError::Tree { tree, source })?;
        }
        Ok(())
    }

    pub(crate) fn check_features(&self, n_features: usize) -> Result<(), StageValidationError> {
        for (tree, weak) in self.trees.iter().enumerate() {
            weak.check_features(n_features)
                .map_err(|source| StageValidationError::Tree { tree, source })?;
        }
        Ok(())
    }
}
