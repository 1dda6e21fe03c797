//! Sample accessor trait for tree traversal.
//!
//! Weak trees only ever ask "what is the response of feature `i` for this
//! sample?". [`SampleAccessor`] captures that question so the same traversal
//! code serves three sources of responses:
//!
//! - plain `&[f32]` feature vectors (already evaluated samples)
//! - rows of the training [`FeatureCache`](super::FeatureCache), through
//!   [`CachedSample`](super::CachedSample)
//! - raw samples evaluated lazily by a [`Representation`], through
//!   [`EvaluatedSample`]

use super::Representation;

// ============================================================================
// SampleAccessor Trait
// ============================================================================

/// Access feature responses for a single sample.
pub trait SampleAccessor {
    /// Get the response of the feature at the given index.
    fn feature(&self, index: usize) -> f32;

    /// Number of features available for this sample.
    fn n_features(&self) -> usize;
}

impl SampleAccessor for [f32] {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.len()
    }
}

impl<const N: usize> SampleAccessor for [f32; N] {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        N
    }
}

impl<T: AsRef<[f32]> + ?Sized> SampleAccessor for &T {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self.as_ref()[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.as_ref().len()
    }
}

// ============================================================================
// EvaluatedSample
// ============================================================================

/// A preprocessed sample whose responses are computed on demand.
///
/// Only the features a tree actually visits are evaluated, which is what makes
/// early cascade rejection cheap at inference time.
pub struct EvaluatedSample<'a, R: Representation + ?Sized> {
    representation: &'a R,
    sample: &'a R::Sample,
}

impl<'a, R: Representation + ?Sized> EvaluatedSample<'a, R> {
    pub fn new(representation: &'a R, sample: &'a R::Sample) -> Self {
        Self { representation, sample }
    }
}

impl<R: Representation + ?Sized> SampleAccessor for EvaluatedSample<'_, R> {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self.representation.evaluate(self.sample, index)
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.representation.n_features()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_and_arrays_are_accessors() {
        let values = [0.5f32, 1.5, 2.5];
        assert_eq!(values.feature(1), 1.5);
        assert_eq!(values[..].n_features(), 3);

        let owned = vec![3.0f32, 4.0];
        let by_ref = &owned;
        assert_eq!(by_ref.feature(0), 3.0);
        assert_eq!(by_ref.n_features(), 2);
    }
}
