//! Cascade of boosted stages and its early-reject evaluation.

use crate::data::SampleAccessor;

use super::{BoostedStage, StageValidationError};

/// Outcome of running a sample through a cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    /// Rejected by stage `stage` (zero-based) with the given decision value.
    Reject { stage: usize, score: f32 },
    /// Passed every stage; `score` is the last stage's decision value.
    Accept { score: f32 },
}

impl Classification {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accept { .. })
    }

    /// Decision value of the last stage evaluated.
    #[inline]
    pub fn score(&self) -> f32 {
        match *self {
            Classification::Reject { score, .. } | Classification::Accept { score } => score,
        }
    }

    /// Number of stages the sample passed.
    #[inline]
    pub fn passed_stages(&self, n_stages: usize) -> usize {
        match *self {
            Classification::Reject { stage, .. } => stage,
            Classification::Accept { .. } => n_stages,
        }
    }
}

/// Structural errors of a [`Cascade`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CascadeValidationError {
    #[error("cascade has no stages")]
    NoStages,

    #[error("stage {stage}: {source}")]
    Stage {
        stage: usize,
        #[source]
        source: StageValidationError,
    },
}

/// Ordered list of stages over a fixed feature space.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    stages: Vec<BoostedStage>,
    n_features: usize,
}

impl Cascade {
    pub fn new(n_features: usize) -> Self {
        Self { stages: Vec::new(), n_features }
    }

    pub fn from_stages(stages: Vec<BoostedStage>, n_features: usize) -> Self {
        Self { stages, n_features }
    }

    pub fn push_stage(&mut self, stage: BoostedStage) {
        self.stages.push(stage);
    }

    #[inline]
    pub fn stages(&self) -> &[BoostedStage] {
        &self.stages
    }

    #[inline]
    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.stages.iter().map(BoostedStage::n_trees).sum()
    }

    /// Evaluate stages in order and stop at the first rejection.
    ///
    /// An empty cascade accepts everything with score `0`.
    pub fn classify<S: SampleAccessor + ?Sized>(&self, sample: &S) -> Classification {
        let mut score = 0.0;
        for (stage, boosted) in self.stages.iter().enumerate() {
            score = boosted.decision(sample);
            if score < 0.0 {
                return Classification::Reject { stage, score };
            }
        }
        Classification::Accept { score }
    }

    #[inline]
    pub fn accepts<S: SampleAccessor + ?Sized>(&self, sample: &S) -> bool {
        self.stages.iter().all(|stage| stage.accepts(sample))
    }

    /// Scalar confidence for detection scoring.
    ///
    /// Outside ROC mode a rejected sample scores `-1`. Otherwise the last
    /// decision value is multiplied by the number of stages passed, so deeper
    /// samples rank higher.
    pub fn confidence<S: SampleAccessor + ?Sized>(&self, sample: &S, roc_mode: bool) -> f32 {
        let result = self.classify(sample);
        if !roc_mode && !result.is_accepted() {
            return -1.0;
        }
        result.score() * result.passed_stages(self.n_stages()) as f32
    }

    /// Validate every stage, including feature indices against `n_features`.
    pub fn validate(&self) -> Result<(), CascadeValidationError> {
        if self.stages.is_empty() {
            return Err(CascadeValidationError::NoStages);
        }
        for (stage, boosted) in self.stages.iter().enumerate() {
            boosted
                .validate()
                .and_then(|()| boosted.check_features(self.n_features))
                .map_err(|source| CascadeValidationError::Stage { stage, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StageParams;
    use crate::repr::{MutableTree, WeakTree};
    use approx::assert_abs_diff_eq;

    /// One stage per threshold: votes -1 below `cut`, +1 above; threshold 0.
    fn cascade(cuts: &[f32]) -> Cascade {
        let stages = cuts
            .iter()
            .map(|&cut| {
                let mut tree = MutableTree::new();
                let root = tree.init_root();
                let (l, r) = tree.apply_numeric_split(root, 0, cut);
                tree.make_leaf(l, -1.0);
                tree.make_leaf(r, 1.0);
                BoostedStage::new(StageParams::default(), vec![tree.freeze()], 0.0)
            })
            .collect();
        Cascade::from_stages(stages, 1)
    }

    #[test]
    fn classify_rejects_at_first_failing_stage() {
        let cascade = cascade(&[0.1, 0.5, 0.9]);
        assert_eq!(cascade.classify(&[0.3f32][..]), Classification::Reject { stage: 1, score: -1.0 });
        assert_eq!(cascade.classify(&[0.0f32][..]), Classification::Reject { stage: 0, score: -1.0 });
        assert_eq!(cascade.classify(&[1.0f32][..]), Classification::Accept { score: 1.0 });
        assert!(cascade.accepts(&[1.0f32][..]));
        assert!(!cascade.accepts(&[0.6f32][..]));
        assert_eq!(cascade.n_trees(), 3);
    }

    #[test]
    fn confidence_modes() {
        let cascade = cascade(&[0.1, 0.5, 0.9]);
        assert_abs_diff_eq!(cascade.confidence(&[0.3f32][..], false), -1.0);
        assert_abs_diff_eq!(cascade.confidence(&[0.3f32][..], true), -1.0);
        assert_abs_diff_eq!(cascade.confidence(&[0.6f32][..], true), -2.0);
        assert_abs_diff_eq!(cascade.confidence(&[0.0f32][..], true), 0.0);
        assert_abs_diff_eq!(cascade.confidence(&[1.0f32][..], false), 3.0);
    }

    #[test]
    fn validate_checks_stages() {
        assert_eq!(Cascade::new(1).validate(), Err(CascadeValidationError::NoStages));
        assert!(cascade(&[0.5]).validate().is_ok());

        let narrow = Cascade::from_stages(cascade(&[0.5]).stages().to_vec(), 0);
        assert!(matches!(narrow.validate(), Err(CascadeValidationError::Stage { stage: 0, .. })));

        let bad = BoostedStage::new(StageParams::default(), vec![WeakTree::leaf(1.0)], f32::INFINITY);
        let invalid = Cascade::from_stages(vec![bad], 1);
        assert!(matches!(invalid.validate(), Err(CascadeValidationError::Stage { stage: 0, .. })));
    }
}
