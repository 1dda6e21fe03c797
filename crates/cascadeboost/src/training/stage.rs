//! Boosted stage trainer.
//!
//! Grows trees one at a time on the current pool until the stage's
//! false-accept target is met or its tree budget is spent. After every tree
//! the decision threshold is re-derived from the positive scores so the
//! stage's true-accept rate holds by construction.

use serde::{Deserialize, Serialize};

use crate::data::{FeatureCache, Label, Representation};
use crate::model::{ParamValidationError, StageParams};
use crate::repr::{BoostedStage, TreeView};
use crate::utils::Parallelism;

use super::boost::{BoostState, trim_mask};
use super::grower::{TreeFitError, TreeGrower};
use super::logger::TrainingLogger;
use super::split::SplitCriterion;

// ============================================================================
// Errors and reports
// ============================================================================

/// A stage that could not produce a single tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum StageError {
    #[error("invalid stage parameters: {0}")]
    InvalidParams(#[from] ParamValidationError),

    #[error("pool has no positive samples")]
    NoPositives,

    #[error("first weak tree failed: {0}")]
    FirstTree(#[source] TreeFitError),
}

/// Why a stage stopped adding trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStop {
    /// False-accept rate reached the stage target.
    TargetReached,
    /// Tree budget spent.
    WeakCountReached,
    /// The next tree could not be fit.
    DegenerateTree(TreeFitError),
}

/// Outcome of one stage's training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub n_trees: usize,
    pub threshold: f32,
    /// True-accept rate on the stage's pool.
    pub tar: f32,
    /// False-accept rate on the stage's pool.
    pub far: f32,
    pub n_pos: usize,
    pub n_neg: usize,
    pub stop: StageStop,
}

// ============================================================================
// Threshold selection
// ============================================================================

/// Decision threshold and the accept rates it yields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageRates {
    pub threshold: f32,
    pub tar: f32,
    pub far: f32,
}

impl StageRates {
    /// Pick the threshold keeping at least `min_tar` of the positives.
    ///
    /// Positive scores are sorted ascending and the threshold is the score at
    /// rank `floor((1 - min_tar) * n_pos)`. A score counts as accepted when
    /// `score - threshold > -epsilon`. With no negatives the FAR is zero.
    pub fn evaluate(scores: &[f64], labels: &[Label], min_tar: f32, epsilon: f32) -> Self {
        debug_assert_eq!(scores.len(), labels.len());

        let mut positives: Vec<f32> = scores
            .iter()
            .zip(labels)
            .filter(|(_, label)| label.is_positive())
            .map(|(&score, _)| score as f32)
            .collect();
        if positives.is_empty() {
            return Self { threshold: f32::NEG_INFINITY, tar: 0.0, far: 1.0 };
        }
        positives.sort_by(f32::total_cmp);

        let n_pos = positives.len();
        let rank = ((1.0 - min_tar as f64) * n_pos as f64).floor() as usize;
        let threshold = positives[rank.min(n_pos - 1)];

        let accepted = |score: f32| score - threshold > -epsilon;
        let tar = positives.iter().filter(|&&s| accepted(s)).count() as f32 / n_pos as f32;

        let (mut n_neg, mut false_accepts) = (0usize, 0usize);
        for (&score, label) in scores.iter().zip(labels) {
            if !label.is_positive() {
                n_neg += 1;
                if accepted(score as f32) {
                    false_accepts += 1;
                }
            }
        }
        let far = if n_neg == 0 { 0.0 } else { false_accepts as f32 / n_neg as f32 };

        Self { threshold, tar, far }
    }
}

// ============================================================================
// StageTrainer
// ============================================================================

/// Trains one [`BoostedStage`] from a filled feature cache.
#[derive(Debug, Clone)]
pub struct StageTrainer {
    params: StageParams,
    grower: TreeGrower,
    threshold_epsilon: f32,
}

impl StageTrainer {
    /// `criterion` defaults to the boosting variant's own criterion.
    pub fn new(
        params: StageParams,
        criterion: Option<SplitCriterion>,
        min_samples_leaf: u32,
        threshold_epsilon: f32,
    ) -> Self {
        let boost_type = params.boost_type;
        let criterion = criterion.unwrap_or_else(|| boost_type.default_criterion());
        let grower = TreeGrower::new(boost_type, criterion, params.max_depth, min_samples_leaf);
        Self { params, grower, threshold_epsilon }
    }

    #[inline]
    pub fn params(&self) -> &StageParams {
        &self.params
    }

    /// Run the boosting loop on every sample in `cache`.
    ///
    /// # Errors
    ///
    /// Fails when the parameters are out of range, the pool has no positives
    /// or the very first tree cannot be fit. Later tree failures end the stage
    /// early.
    pub fn train<R: Representation>(
        &self,
        cache: &FeatureCache<'_, R>,
        logger: &TrainingLogger,
        parallelism: Parallelism,
    ) -> Result<(BoostedStage, StageReport), StageError> {
        self.params.validate()?;
        let n_samples = cache.n_samples();
        let n_pos = cache.count(Label::Positive);
        if n_pos == 0 {
            return Err(StageError::NoPositives);
        }

        let mut state = BoostState::new(self.params.boost_type, cache.labels());
        let mut trees = Vec::new();
        let mut rates = StageRates { threshold: 0.0, tar: 0.0, far: 1.0 };

        let stop = loop {
            let mask = trim_mask(state.weights(), self.params.weight_trim_rate);
            let mut tree = match self.grower.grow(cache, &state, &mask, parallelism) {
                Ok(tree) => tree,
                Err(err) if trees.is_empty() => return Err(StageError::FirstTree(err)),
                Err(err) => {
                    logger.warn(format_args!("stage stopped after {} trees: {err}", trees.len()));
                    break StageStop::DegenerateTree(err);
                }
            };

            let raw: Vec<f32> = parallelism.maybe_par_map(0..n_samples, |i| tree.predict(&cache.accessor(i)));
            let scale = state.tree_scale(&raw);
            if scale != 1.0 {
                tree.scale_values(scale as f32);
            }

            // Scores come from the frozen tree so they match inference exactly.
            let tree = tree.freeze();
            let outputs: Vec<f32> = parallelism.maybe_par_map(0..n_samples, |i| tree.predict(&cache.accessor(i)));
            state.update(&raw, &outputs);
            trees.push(tree);

            rates = StageRates::evaluate(state.scores(), cache.labels(), self.params.min_tar, self.threshold_epsilon);
            logger.log_tree(trees.len(), rates.tar, rates.far);

            if rates.far <= self.params.max_far {
                break StageStop::TargetReached;
            }
            if trees.len() >= self.params.max_weak_count as usize {
                break StageStop::WeakCountReached;
            }
        };

        let report = StageReport {
            n_trees: trees.len(),
            threshold: rates.threshold,
            tar: rates.tar,
            far: rates.far,
            n_pos,
            n_neg: n_samples - n_pos,
            stop,
        };
        Ok((BoostedStage::new(self.params.clone(), trees, rates.threshold), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScalarRepresentation, two_clusters};
    use crate::training::{BoostType, Verbosity};
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn silent() -> TrainingLogger {
        TrainingLogger::new(Verbosity::Silent)
    }

    #[test]
    fn threshold_keeps_min_tar_of_positives() {
        let scores = [0.1, 0.2, 0.3, 0.4, 0.5, 0.0, 0.25];
        let labels = [
            Label::Positive,
            Label::Positive,
            Label::Positive,
            Label::Positive,
            Label::Positive,
            Label::Negative,
            Label::Negative,
        ];
        // floor(0.5 * 5) = rank 2 -> 0.3
        let rates = StageRates::evaluate(&scores, &labels, 0.5, f32::EPSILON);
        assert_abs_diff_eq!(rates.threshold, 0.3);
        assert_abs_diff_eq!(rates.tar, 0.6);
        assert_abs_diff_eq!(rates.far, 0.0);

        let rates = StageRates::evaluate(&scores, &labels, 0.99, f32::EPSILON);
        assert_abs_diff_eq!(rates.threshold, 0.1);
        assert_abs_diff_eq!(rates.tar, 1.0);
        assert_abs_diff_eq!(rates.far, 0.5);
    }

    #[test]
    fn ties_at_threshold_are_accepted() {
        let scores = [1.0, 1.0, 1.0, 1.0];
        let labels = [Label::Positive, Label::Positive, Label::Negative, Label::Negative];
        let rates = StageRates::evaluate(&scores, &labels, 0.5, f32::EPSILON);
        assert_abs_diff_eq!(rates.tar, 1.0);
        assert_abs_diff_eq!(rates.far, 1.0);
    }

    #[test]
    fn no_negatives_means_zero_far() {
        let rates = StageRates::evaluate(&[0.5, 0.7], &[Label::Positive, Label::Positive], 0.9, f32::EPSILON);
        assert_eq!(rates.far, 0.0);
    }

    #[rstest]
    #[case(BoostType::Discrete)]
    #[case(BoostType::Real)]
    #[case(BoostType::Logit)]
    #[case(BoostType::Gentle)]
    fn separable_clusters_meet_targets(#[case] boost_type: BoostType) {
        let repr = ScalarRepresentation::new(1);
        let (samples, labels) = two_clusters(50, 200, 0.05, 11);
        let cache = FeatureCache::new(&repr, samples, labels, None, Parallelism::Sequential);

        let params = StageParams { boost_type, min_tar: 0.99, max_far: 0.5, ..Default::default() };
        let trainer = StageTrainer::new(params, None, 1, f32::EPSILON);
        let (stage, report) = trainer.train(&cache, &silent(), Parallelism::Sequential).unwrap();

        assert_eq!(report.stop, StageStop::TargetReached);
        assert!(report.tar >= 0.99);
        assert!(report.far <= 0.5);
        assert_eq!(stage.n_trees(), report.n_trees);
        assert_eq!(stage.threshold(), report.threshold);

        let accepted_pos = (0..cache.n_samples())
            .filter(|&i| cache.label(i).is_positive() && stage.accepts(&cache.accessor(i)))
            .count();
        assert!(accepted_pos as f32 >= 0.99 * 50.0);
    }

    #[test]
    fn no_positives_is_an_error() {
        let repr = ScalarRepresentation::new(1);
        let cache = FeatureCache::new(&repr, vec![vec![0.0]; 3], vec![Label::Negative; 3], None, Parallelism::Sequential);
        let trainer = StageTrainer::new(StageParams::default(), None, 1, f32::EPSILON);
        assert_eq!(trainer.train(&cache, &silent(), Parallelism::Sequential).unwrap_err(), StageError::NoPositives);
    }

    #[rstest]
    #[case::zero_weak_count(StageParams { max_weak_count: 0, ..Default::default() })]
    #[case::tar_above_one(StageParams { min_tar: 1.5, ..Default::default() })]
    #[case::too_deep(StageParams { max_depth: 65, ..Default::default() })]
    fn out_of_range_params_fail_before_training(#[case] params: StageParams) {
        let repr = ScalarRepresentation::new(1);
        let (samples, labels) = two_clusters(10, 10, 0.05, 2);
        let cache = FeatureCache::new(&repr, samples, labels, None, Parallelism::Sequential);

        let trainer = StageTrainer::new(params.clone(), None, 1, f32::EPSILON);
        let err = trainer.train(&cache, &silent(), Parallelism::Sequential).unwrap_err();
        assert_eq!(err, StageError::InvalidParams(params.validate().unwrap_err()));
    }

    #[test]
    fn unsplittable_first_tree_fails_stage() {
        let repr = ScalarRepresentation::new(1);
        let cache = FeatureCache::new(
            &repr,
            vec![vec![0.0]; 4],
            vec![Label::Positive, Label::Negative, Label::Positive, Label::Negative],
            None,
            Parallelism::Sequential,
        );
        let trainer = StageTrainer::new(StageParams::default(), None, 1, f32::EPSILON);
        assert_eq!(
            trainer.train(&cache, &silent(), Parallelism::Sequential).unwrap_err(),
            StageError::FirstTree(TreeFitError::NoValidSplit)
        );
    }

    #[test]
    fn weak_count_caps_the_stage() {
        let repr = ScalarRepresentation::new(1);
        // Overlapping clusters cannot reach a tiny FAR with stumps.
        let (samples, labels) = two_clusters(40, 40, 0.8, 5);
        let cache = FeatureCache::new(&repr, samples, labels, None, Parallelism::Sequential);

        let params = StageParams { min_tar: 0.99, max_far: 0.01, max_weak_count: 3, ..Default::default() };
        let trainer = StageTrainer::new(params, None, 1, f32::EPSILON);
        let (stage, report) = trainer.train(&cache, &silent(), Parallelism::Sequential).unwrap();
        assert!(stage.n_trees() <= 3);
        assert!(matches!(report.stop, StageStop::WeakCountReached | StageStop::DegenerateTree(_)));
        assert!(report.tar >= 0.99);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let repr = ScalarRepresentation::new(3);
        let (samples, labels) = crate::testing::noisy_features(60, 120, 3, 9);
        let cache = FeatureCache::new(&repr, samples, labels, None, Parallelism::Parallel);

        let params = StageParams { max_far: 0.05, max_weak_count: 10, max_depth: 2, ..Default::default() };
        let trainer = StageTrainer::new(params, None, 1, f32::EPSILON);
        let (seq, _) = trainer.train(&cache, &silent(), Parallelism::Sequential).unwrap();
        let (par, _) = trainer.train(&cache, &silent(), Parallelism::Parallel).unwrap();
        assert_eq!(seq, par);
    }
}
