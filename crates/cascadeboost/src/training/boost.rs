//! Boosting variants: leaf rules, tree scaling and sample reweighting.
//!
//! All four AdaBoost-family variants share one loop; [`BoostType`] selects
//! the per-variant pieces and [`BoostState`] owns the per-sample buffers the
//! loop mutates.

use serde::{Deserialize, Serialize};

use super::split::{NodeStats, SplitCriterion};
use crate::data::Label;

/// Clamp for the discrete weighted error, keeps `alpha` finite.
const DISCRETE_ERR_CLAMP: f64 = 1e-10;
/// Regularizes the real-boost log-odds of pure leaves.
const REAL_EPSILON: f64 = 1e-10;
/// Floor for logit weights `p (1 - p)`.
const LOGIT_MIN_WEIGHT: f64 = 1e-6;
/// Bound on the logit working response.
const LOGIT_MAX_RESPONSE: f64 = 10.0;

// ============================================================================
// BoostType
// ============================================================================

/// AdaBoost variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoostType {
    /// Leaves vote `±1`; the tree is weighted by `ln((1 - err) / err)`.
    Discrete,
    /// Leaves output half the weighted log-odds.
    Real,
    /// Leaves fit the logit working response by weighted least squares.
    Logit,
    /// Leaves output the weighted mean label.
    #[default]
    Gentle,
}

impl BoostType {
    /// Integer code used by the persisted format.
    pub fn code(self) -> i32 {
        match self {
            BoostType::Discrete => 0,
            BoostType::Real => 1,
            BoostType::Logit => 2,
            BoostType::Gentle => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(BoostType::Discrete),
            1 => Some(BoostType::Real),
            2 => Some(BoostType::Logit),
            3 => Some(BoostType::Gentle),
            _ => None,
        }
    }

    /// Split criterion used when none is configured.
    pub fn default_criterion(self) -> SplitCriterion {
        match self {
            BoostType::Discrete => SplitCriterion::Misclass,
            BoostType::Real => SplitCriterion::Gini,
            BoostType::Logit | BoostType::Gentle => SplitCriterion::SquaredError,
        }
    }

    /// Value of a leaf holding `stats`, before any tree-level scaling.
    pub fn leaf_value(self, stats: &NodeStats) -> f64 {
        match self {
            BoostType::Discrete => {
                if stats.w_pos >= stats.w_neg {
                    1.0
                } else {
                    -1.0
                }
            }
            BoostType::Real => {
                let total = stats.w_pos + stats.w_neg;
                if total <= 0.0 {
                    return 0.0;
                }
                let p = stats.w_pos / total;
                0.5 * ((p + REAL_EPSILON) / (1.0 - p + REAL_EPSILON)).ln()
            }
            BoostType::Gentle => {
                if stats.sum_w > 0.0 {
                    stats.sum_wy / stats.sum_w
                } else {
                    0.0
                }
            }
            BoostType::Logit => {
                if stats.sum_w > 0.0 {
                    0.5 * stats.sum_wy / stats.sum_w
                } else {
                    0.0
                }
            }
        }
    }
}

// ============================================================================
// BoostState
// ============================================================================

/// Per-sample buffers of one stage's boosting loop.
///
/// Weights always sum to one after construction and after every
/// [`update`](Self::update).
#[derive(Debug, Clone)]
pub struct BoostState {
    boost_type: BoostType,
    labels: Vec<Label>,
    weights: Vec<f64>,
    /// Regression targets seen by the split search.
    targets: Vec<f32>,
    /// Running ensemble score per sample.
    scores: Vec<f64>,
    /// Tree weight of the last discrete tree.
    alpha: f64,
}

impl BoostState {
    pub fn new(boost_type: BoostType, labels: &[Label]) -> Self {
        let n = labels.len();
        let mut state = Self {
            boost_type,
            labels: labels.to_vec(),
            weights: vec![1.0; n],
            targets: labels.iter().map(|l| l.sign()).collect(),
            scores: vec![0.0; n],
            alpha: 1.0,
        };
        if boost_type == BoostType::Logit {
            state.refresh_logit();
        }
        state.normalize();
        state
    }

    #[inline]
    pub fn boost_type(&self) -> BoostType {
        self.boost_type
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn targets(&self) -> &[f32] {
        &self.targets
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    #[inline]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Factor applied to a freshly grown tree given its raw per-sample outputs.
    ///
    /// Discrete trees are weighted by `ln((1 - err) / err)` where `err` is the
    /// weighted error over every sample; other variants are left unscaled.
    pub fn tree_scale(&mut self, raw_outputs: &[f32]) -> f64 {
        if self.boost_type != BoostType::Discrete {
            return 1.0;
        }
        debug_assert_eq!(raw_outputs.len(), self.weights.len());

        let (mut err, mut total) = (0.0f64, 0.0f64);
        for ((&w, &out), label) in self.weights.iter().zip(raw_outputs).zip(&self.labels) {
            total += w;
            if (out >= 0.0) != label.is_positive() {
                err += w;
            }
        }
        let err = if total > 0.0 { err / total } else { 0.5 };
        let err = err.clamp(DISCRETE_ERR_CLAMP, 1.0 - DISCRETE_ERR_CLAMP);
        self.alpha = ((1.0 - err) / err).ln();
        self.alpha
    }

    /// Add a scaled tree's outputs to the scores and reweight every sample.
    ///
    /// `raw_outputs` are the unscaled votes passed to
    /// [`tree_scale`](Self::tree_scale); discrete boosting judges mistakes
    /// by their sign.
    pub fn update(&mut self, raw_outputs: &[f32], outputs: &[f32]) {
        debug_assert_eq!(outputs.len(), self.weights.len());
        debug_assert_eq!(raw_outputs.len(), self.weights.len());

        for (score, &out) in self.scores.iter_mut().zip(outputs) {
            *score += out as f64;
        }

        match self.boost_type {
            BoostType::Discrete => {
                let boost = self.alpha.exp();
                for ((w, &raw), label) in self.weights.iter_mut().zip(raw_outputs).zip(&self.labels) {
                    if (raw >= 0.0) != label.is_positive() {
                        *w *= boost;
                    }
                }
            }
            BoostType::Real | BoostType::Gentle => {
                for ((w, &out), label) in self.weights.iter_mut().zip(outputs).zip(&self.labels) {
                    *w *= (-(label.sign() as f64) * out as f64).exp();
                }
            }
            BoostType::Logit => self.refresh_logit(),
        }

        self.normalize();
    }

    /// Recompute logit weights and working responses from the scores.
    fn refresh_logit(&mut self) {
        for (((w, z), &score), label) in self
            .weights
            .iter_mut()
            .zip(self.targets.iter_mut())
            .zip(&self.scores)
            .zip(&self.labels)
        {
            let p = 1.0 / (1.0 + (-2.0 * score).exp());
            *w = (p * (1.0 - p)).max(LOGIT_MIN_WEIGHT);
            let response = if label.is_positive() { 1.0 / p } else { -1.0 / (1.0 - p) };
            *z = response.clamp(-LOGIT_MAX_RESPONSE, LOGIT_MAX_RESPONSE) as f32;
        }
    }

    fn normalize(&mut self) {
        let total: f64 = self.weights.iter().sum();
        if total > 0.0 && total.is_finite() {
            for w in &mut self.weights {
                *w /= total;
            }
        }
    }
}

// ============================================================================
// Weight trimming
// ============================================================================

/// Participation mask for the next tree.
///
/// With weights sorted ascending, the cut is the first weight at which the
/// running sum exceeds `(1 - trim_rate)` of the total; samples below the cut
/// sit out the round. Rates outside `(0, 1)` keep everything.
pub fn trim_mask(weights: &[f64], trim_rate: f32) -> Vec<bool> {
    if !(trim_rate > 0.0 && trim_rate < 1.0) {
        return vec![true; weights.len()];
    }

    let mut sorted = weights.to_vec();
    sorted.sort_by(f64::total_cmp);
    let total: f64 = sorted.iter().sum();
    let limit = (1.0 - trim_rate as f64) * total;

    let mut cumulative = 0.0;
    let mut cut = f64::NEG_INFINITY;
    for &w in &sorted {
        cumulative += w;
        if cumulative > limit {
            cut = w;
            break;
        }
    }

    weights.iter().map(|&w| w >= cut).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn labels() -> Vec<Label> {
        vec![Label::Positive, Label::Positive, Label::Negative, Label::Negative]
    }

    #[rstest]
    #[case(BoostType::Discrete)]
    #[case(BoostType::Real)]
    #[case(BoostType::Logit)]
    #[case(BoostType::Gentle)]
    fn codes_round_trip_and_weights_start_uniform(#[case] boost_type: BoostType) {
        assert_eq!(BoostType::from_code(boost_type.code()), Some(boost_type));
        let state = BoostState::new(boost_type, &labels());
        for &w in state.weights() {
            assert_abs_diff_eq!(w, 0.25);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(BoostType::from_code(4), None);
        assert_eq!(BoostType::from_code(-1), None);
    }

    #[test]
    fn leaf_rules() {
        let stats = NodeStats { count: 4, n_pos: 3, sum_w: 1.0, sum_wy: 0.5, w_pos: 0.75, w_neg: 0.25 };
        assert_eq!(BoostType::Discrete.leaf_value(&stats), 1.0);
        assert_abs_diff_eq!(BoostType::Real.leaf_value(&stats), 0.5 * 3f64.ln(), epsilon = 1e-9);
        assert_abs_diff_eq!(BoostType::Gentle.leaf_value(&stats), 0.5);
        assert_abs_diff_eq!(BoostType::Logit.leaf_value(&stats), 0.25);
        assert_eq!(BoostType::Gentle.leaf_value(&NodeStats::default()), 0.0);
    }

    #[test]
    fn logit_starts_with_unit_working_response() {
        let state = BoostState::new(BoostType::Logit, &labels());
        assert_eq!(state.targets(), &[2.0, 2.0, -2.0, -2.0]);
    }

    #[test]
    fn discrete_update_boosts_mistakes() {
        let mut state = BoostState::new(BoostType::Discrete, &labels());
        // One positive misclassified: err = 0.25, alpha = ln 3.
        let raw = [1.0, -1.0, -1.0, -1.0];
        let alpha = state.tree_scale(&raw);
        assert_abs_diff_eq!(alpha, 3f64.ln(), epsilon = 1e-12);

        let outputs: Vec<f32> = raw.iter().map(|&r| r * alpha as f32).collect();
        state.update(&raw, &outputs);
        // Weights 1,3,1,1 normalized.
        assert_abs_diff_eq!(state.weights()[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(state.weights()[0], 1.0 / 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(state.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn gentle_update_is_exponential_margin() {
        let mut state = BoostState::new(BoostType::Gentle, &labels());
        assert_eq!(state.tree_scale(&[0.5; 4]), 1.0);
        state.update(&[0.5; 4], &[0.5; 4]);

        let e = (-0.5f64).exp();
        let f = 0.5f64.exp();
        let total = 2.0 * e + 2.0 * f;
        assert_abs_diff_eq!(state.weights()[0], e / total, epsilon = 1e-12);
        assert_abs_diff_eq!(state.weights()[3], f / total, epsilon = 1e-12);
        assert_abs_diff_eq!(state.scores()[2], 0.5);
    }

    #[test]
    fn logit_update_tracks_probability() {
        let mut state = BoostState::new(BoostType::Logit, &labels());
        state.update(&[1.0; 4], &[1.0; 4]);
        let p = 1.0 / (1.0 + (-2.0f64).exp());
        assert_abs_diff_eq!(state.targets()[0] as f64, 1.0 / p, epsilon = 1e-6);
        assert_abs_diff_eq!(state.targets()[2] as f64, -1.0 / (1.0 - p), epsilon = 1e-5);
        // Equal scores mean equal weights.
        assert_abs_diff_eq!(state.weights()[0], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn trim_keeps_heavy_samples() {
        let weights = [0.01, 0.02, 0.47, 0.5];
        assert_eq!(trim_mask(&weights, 0.98), vec![false, true, true, true]);
        assert_eq!(trim_mask(&weights, 0.95), vec![false, false, true, true]);
        assert_eq!(trim_mask(&weights, 1.0), vec![true; 4]);
        assert_eq!(trim_mask(&weights, 0.0), vec![true; 4]);
    }

    #[test]
    fn trim_keeps_uniform_weights() {
        assert_eq!(trim_mask(&[0.1; 10], 0.95), vec![true; 10]);
    }
}
