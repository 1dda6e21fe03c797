//! Feature representation interface.
//!
//! A [`Representation`] turns a raw sample (an image window, a pre-extracted
//! descriptor, ...) into scalar feature responses. Concrete extractors such as
//! LBP or Haar-like features live outside this crate and plug in through this
//! trait.

use super::Label;

/// Maps samples to scalar feature responses.
///
/// Implementations must be pure: evaluating the same feature on the same
/// sample always returns the same value. The feature cache and the cascade
/// rely on this to mix cached and recomputed responses freely.
pub trait Representation: Sync {
    /// Raw input handed to [`preprocess`](Self::preprocess), e.g. an image crop.
    type Raw: Send;

    /// Normalized sample the features are evaluated on.
    type Sample: Send + Sync;

    /// Total number of features this representation exposes.
    fn n_features(&self) -> usize;

    /// Normalize a raw input (resize, integral image, ...).
    fn preprocess(&self, raw: Self::Raw) -> Self::Sample;

    /// Response of a single feature.
    fn evaluate(&self, sample: &Self::Sample, feature: usize) -> f32;

    /// Responses of the first `out.len()` features, in index order.
    fn evaluate_into(&self, sample: &Self::Sample, out: &mut [f32]) {
        for (feature, value) in out.iter_mut().enumerate() {
            *value = self.evaluate(sample, feature);
        }
    }

    /// Responses of an arbitrary subset of features.
    fn evaluate_indices(&self, sample: &Self::Sample, indices: &[usize], out: &mut [f32]) {
        debug_assert_eq!(indices.len(), out.len());
        for (&feature, value) in indices.iter().zip(out.iter_mut()) {
            *value = self.evaluate(sample, feature);
        }
    }

    /// Adapt the representation to the training data.
    ///
    /// Fixed feature sets leave this as a no-op.
    fn train(&mut self, _samples: &[Self::Sample], _labels: &[Label]) {}
}
