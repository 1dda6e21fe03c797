//! Split criteria and exact per-feature split search.

use serde::{Deserialize, Serialize};

use crate::data::Label;

// ============================================================================
// NodeStats
// ============================================================================

/// Weighted sufficient statistics of the samples reaching a node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStats {
    pub count: u32,
    pub n_pos: u32,
    pub sum_w: f64,
    /// Weighted sum of regression targets (`±1`, or the logit working response).
    pub sum_wy: f64,
    pub w_pos: f64,
    pub w_neg: f64,
}

impl NodeStats {
    #[inline]
    pub fn add(&mut self, weight: f64, target: f32, label: Label) {
        self.count += 1;
        self.sum_w += weight;
        self.sum_wy += weight * target as f64;
        if label.is_positive() {
            self.n_pos += 1;
            self.w_pos += weight;
        } else {
            self.w_neg += weight;
        }
    }

    /// Statistics of `self` with `other` removed.
    #[inline]
    pub fn minus(&self, other: &NodeStats) -> NodeStats {
        NodeStats {
            count: self.count - other.count,
            n_pos: self.n_pos - other.n_pos,
            sum_w: self.sum_w - other.sum_w,
            sum_wy: self.sum_wy - other.sum_wy,
            w_pos: self.w_pos - other.w_pos,
            w_neg: self.w_neg - other.w_neg,
        }
    }

    #[inline]
    pub fn n_neg(&self) -> u32 {
        self.count - self.n_pos
    }

    /// All samples share one label.
    #[inline]
    pub fn is_pure(&self) -> bool {
        self.n_pos == 0 || self.n_pos == self.count
    }

    pub fn from_samples(indices: &[u32], weights: &[f64], targets: &[f32], labels: &[Label]) -> Self {
        let mut stats = NodeStats::default();
        for &idx in indices {
            let i = idx as usize;
            stats.add(weights[i], targets[i], labels[i]);
        }
        stats
    }
}

// ============================================================================
// SplitCriterion
// ============================================================================

/// Impurity measure minimized by the split search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// Weighted misclassification: `min(w+, w-)`.
    Misclass,
    /// Weighted Gini impurity: `2 w+ w- / W`.
    Gini,
    /// Weighted cross-entropy.
    Entropy,
    /// Weighted squared error around the node mean.
    SquaredError,
}

/// Gains within this distance of zero count as zero.
const GAIN_TOLERANCE: f64 = 1e-12;

impl SplitCriterion {
    /// Impurity of a node, scaled by its total weight.
    ///
    /// Squared error drops the constant `sum(w y^2)` term, which cancels in
    /// every gain.
    pub fn impurity(self, stats: &NodeStats) -> f64 {
        let total = stats.w_pos + stats.w_neg;
        match self {
            SplitCriterion::Misclass => stats.w_pos.min(stats.w_neg),
            SplitCriterion::Gini => {
                if total > 0.0 {
                    2.0 * stats.w_pos * stats.w_neg / total
                } else {
                    0.0
                }
            }
            SplitCriterion::Entropy => {
                let term = |w: f64| if w > 0.0 { -w * (w / total).ln() } else { 0.0 };
                term(stats.w_pos) + term(stats.w_neg)
            }
            SplitCriterion::SquaredError => {
                if stats.sum_w > 0.0 {
                    -(stats.sum_wy * stats.sum_wy) / stats.sum_w
                } else {
                    0.0
                }
            }
        }
    }

    /// Criteria that score label purity rather than a regression target.
    #[inline]
    pub fn is_classification(self) -> bool {
        !matches!(self, SplitCriterion::SquaredError)
    }

    #[inline]
    pub fn gain(self, parent: &NodeStats, left: &NodeStats, right: &NodeStats) -> f64 {
        self.impurity(parent) - self.impurity(left) - self.impurity(right)
    }

    /// Whether a split with `gain` is worth taking.
    ///
    /// Classification criteria accept zero gain; squared error needs a strict
    /// improvement.
    #[inline]
    pub fn accepts_gain(self, gain: f64, parent: &NodeStats) -> bool {
        let tolerance = GAIN_TOLERANCE * parent.sum_w.max(1.0);
        if self.is_classification() {
            gain >= -tolerance
        } else {
            gain > tolerance
        }
    }
}

// ============================================================================
// Split search
// ============================================================================

/// Best split found on one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitCandidate {
    pub feature: u32,
    pub threshold: f32,
    pub gain: f64,
    pub left: NodeStats,
    pub right: NodeStats,
}

/// Per-node context shared by every feature's search.
pub(crate) struct SplitContext<'a> {
    pub criterion: SplitCriterion,
    pub min_samples_leaf: u32,
    pub weights: &'a [f64],
    pub targets: &'a [f32],
    pub labels: &'a [Label],
}

/// Midpoint between two consecutive distinct responses, kept strictly below `hi`.
#[inline]
fn cut_threshold(lo: f32, hi: f32) -> f32 {
    let mid = lo + (hi - lo) * 0.5;
    if mid < hi { mid } else { lo }
}

impl SplitContext<'_> {
    /// Exact search over the sorted responses of one feature.
    ///
    /// `responses[k]` belongs to sample `indices[k]`. Only cuts between
    /// distinct values are scored; the first cut with the highest gain wins.
    pub fn best_for_feature(
        &self,
        feature: u32,
        indices: &[u32],
        responses: &[f32],
        parent: &NodeStats,
    ) -> Option<SplitCandidate> {
        debug_assert_eq!(indices.len(), responses.len());
        let n = indices.len();
        if n < 2 {
            return None;
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| responses[a].total_cmp(&responses[b]));

        let parent_impurity = self.criterion.impurity(parent);
        let mut left = NodeStats::default();
        let mut best: Option<SplitCandidate> = None;

        for k in 0..n - 1 {
            let i = indices[order[k]] as usize;
            left.add(self.weights[i], self.targets[i], self.labels[i]);

            let lo = responses[order[k]];
            let hi = responses[order[k + 1]];
            if lo == hi || hi.is_nan() {
                continue;
            }
            let right = parent.minus(&left);
            if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                continue;
            }

            let gain = parent_impurity - self.criterion.impurity(&left) - self.criterion.impurity(&right);
            if best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate { feature, threshold: cut_threshold(lo, hi), gain, left, right });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn stats(w_pos: f64, w_neg: f64) -> NodeStats {
        NodeStats {
            count: 2,
            n_pos: 1,
            sum_w: w_pos + w_neg,
            sum_wy: w_pos - w_neg,
            w_pos,
            w_neg,
        }
    }

    #[rstest]
    #[case(SplitCriterion::Misclass, 0.25)]
    #[case(SplitCriterion::Gini, 0.375)]
    #[case(SplitCriterion::Entropy, 0.5623351446188083)]
    #[case(SplitCriterion::SquaredError, -0.25)]
    fn impurity_values(#[case] criterion: SplitCriterion, #[case] expected: f64) {
        assert_abs_diff_eq!(criterion.impurity(&stats(0.75, 0.25)), expected, epsilon = 1e-12);
    }

    #[rstest]
    #[case(SplitCriterion::Misclass)]
    #[case(SplitCriterion::Gini)]
    #[case(SplitCriterion::Entropy)]
    fn pure_nodes_have_zero_impurity(#[case] criterion: SplitCriterion) {
        assert_abs_diff_eq!(criterion.impurity(&stats(1.0, 0.0)), 0.0);
        assert_abs_diff_eq!(criterion.impurity(&NodeStats::default()), 0.0);
    }

    #[test]
    fn zero_gain_acceptance_depends_on_criterion() {
        let parent = stats(0.5, 0.5);
        assert!(SplitCriterion::Gini.accepts_gain(0.0, &parent));
        assert!(!SplitCriterion::SquaredError.accepts_gain(0.0, &parent));
        assert!(SplitCriterion::SquaredError.accepts_gain(0.1, &parent));
    }

    #[test]
    fn cut_threshold_stays_below_upper_value() {
        assert_eq!(cut_threshold(1.0, 2.0), 1.5);
        let hi = f32::from_bits(1.0f32.to_bits() + 1);
        assert_eq!(cut_threshold(1.0, hi), 1.0);
    }

    fn context<'a>(
        criterion: SplitCriterion,
        weights: &'a [f64],
        targets: &'a [f32],
        labels: &'a [Label],
    ) -> SplitContext<'a> {
        SplitContext { criterion, min_samples_leaf: 1, weights, targets, labels }
    }

    #[test]
    fn finds_separating_midpoint() {
        let labels = [Label::Negative, Label::Negative, Label::Positive, Label::Positive];
        let targets: Vec<f32> = labels.iter().map(|l| l.sign()).collect();
        let weights = [0.25; 4];
        let indices = [0u32, 1, 2, 3];
        // Unsorted on purpose.
        let responses = [0.2f32, 0.0, 1.0, 0.8];
        let parent = NodeStats::from_samples(&indices, &weights, &targets, &labels);

        for criterion in [SplitCriterion::Misclass, SplitCriterion::Gini, SplitCriterion::SquaredError] {
            let split = context(criterion, &weights, &targets, &labels)
                .best_for_feature(3, &indices, &responses, &parent)
                .unwrap();
            assert_eq!(split.feature, 3);
            assert_abs_diff_eq!(split.threshold, 0.5);
            assert_eq!(split.left.count, 2);
            assert_eq!(split.left.n_pos, 0);
            assert_eq!(split.right.n_pos, 2);
        }
    }

    #[test]
    fn ties_are_never_split_and_min_leaf_is_respected() {
        let labels = [Label::Negative, Label::Positive, Label::Positive];
        let targets: Vec<f32> = labels.iter().map(|l| l.sign()).collect();
        let weights = [1.0 / 3.0; 3];
        let indices = [0u32, 1, 2];
        let parent = NodeStats::from_samples(&indices, &weights, &targets, &labels);

        let ctx = context(SplitCriterion::Gini, &weights, &targets, &labels);
        assert!(ctx.best_for_feature(0, &indices, &[1.0, 1.0, 1.0], &parent).is_none());

        let strict = SplitContext { min_samples_leaf: 2, ..ctx };
        assert!(strict.best_for_feature(0, &indices, &[0.0, 1.0, 2.0], &parent).is_none());
    }

    #[test]
    fn first_best_cut_wins() {
        // Symmetric data: cuts at 0.5 and 2.5 have equal gain.
        let labels = [Label::Negative, Label::Positive, Label::Positive, Label::Negative];
        let targets: Vec<f32> = labels.iter().map(|l| l.sign()).collect();
        let weights = [0.25; 4];
        let indices = [0u32, 1, 2, 3];
        let parent = NodeStats::from_samples(&indices, &weights, &targets, &labels);

        let split = context(SplitCriterion::Gini, &weights, &targets, &labels)
            .best_for_feature(0, &indices, &[0.0, 1.0, 2.0, 3.0], &parent)
            .unwrap();
        assert_abs_diff_eq!(split.threshold, 0.5);
    }
}
