//! Feature response cache.
//!
//! [`FeatureCache`] owns the training samples, their labels and a dense
//! `[n_samples, n_precomputed]` table of feature responses. Features beyond the
//! precompute window are evaluated on demand, so a small budget only costs CPU,
//! never correctness.

use ndarray::{Array2, ArrayViewMut1, Axis};

use super::{Label, Representation, SampleAccessor};
use crate::utils::Parallelism;

/// Dense per-sample response table backed by a [`Representation`].
pub struct FeatureCache<'r, R: Representation> {
    representation: &'r R,
    samples: Vec<R::Sample>,
    labels: Vec<Label>,
    /// Row-major: one row per sample, one column per precomputed feature.
    values: Array2<f32>,
    n_precomputed: usize,
    parallelism: Parallelism,
}

impl<'r, R: Representation> FeatureCache<'r, R> {
    /// Build the cache and materialize the precompute window.
    ///
    /// `budget` bounds the number of resident responses. With `None` every
    /// feature of every sample is materialized; otherwise the window covers the
    /// first `budget / n_samples` features.
    pub fn new(
        representation: &'r R,
        samples: Vec<R::Sample>,
        labels: Vec<Label>,
        budget: Option<usize>,
        parallelism: Parallelism,
    ) -> Self {
        debug_assert_eq!(samples.len(), labels.len());

        let n_features = representation.n_features();
        let n_samples = samples.len();
        let n_precomputed = match budget {
            None => n_features,
            Some(budget) => (budget / n_samples.max(1)).min(n_features),
        };

        let mut cache = Self {
            representation,
            samples,
            labels,
            values: Array2::zeros((n_samples, n_precomputed)),
            n_precomputed,
            parallelism,
        };
        cache.fill();
        cache
    }

    /// Evaluate the precompute window for every sample.
    ///
    /// Each worker writes exactly one row.
    fn fill(&mut self) {
        if self.n_precomputed == 0 {
            return;
        }
        let representation = self.representation;
        self.parallelism.maybe_par_bridge_for_each(
            self.values.axis_iter_mut(Axis(0)).zip(self.samples.iter()),
            |(row, sample)| write_row(representation, sample, row),
        );
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.representation.n_features()
    }

    /// Number of features held resident for every sample.
    #[inline]
    pub fn n_precomputed(&self) -> usize {
        self.n_precomputed
    }

    #[inline]
    pub fn label(&self, idx: usize) -> Label {
        self.labels[idx]
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    #[inline]
    pub fn sample(&self, idx: usize) -> &R::Sample {
        &self.samples[idx]
    }

    #[inline]
    pub fn representation(&self) -> &'r R {
        self.representation
    }

    /// Number of samples with the given label.
    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Response of `feature` for sample `idx`.
    ///
    /// Reads the table inside the precompute window and recomputes outside it.
    #[inline]
    pub fn response(&self, feature: usize, idx: usize) -> f32 {
        if feature < self.n_precomputed {
            self.values[[idx, feature]]
        } else {
            self.representation.evaluate(&self.samples[idx], feature)
        }
    }

    /// Responses of one feature for a subset of samples.
    pub fn responses_into(&self, feature: usize, indices: &[u32], out: &mut [f32]) {
        debug_assert_eq!(indices.len(), out.len());
        if feature < self.n_precomputed {
            let column = self.values.column(feature);
            for (&idx, value) in indices.iter().zip(out.iter_mut()) {
                *value = column[idx as usize];
            }
        } else {
            for (&idx, value) in indices.iter().zip(out.iter_mut()) {
                *value = self.representation.evaluate(&self.samples[idx as usize], feature);
            }
        }
    }

    /// Row view usable wherever a [`SampleAccessor`] is expected.
    #[inline]
    pub fn accessor(&self, idx: usize) -> CachedSample<'_, 'r, R> {
        CachedSample { cache: self, idx }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Install `sample` at slot `idx`, or append it when `idx == n_samples()`.
    ///
    /// The slot's precompute window is evaluated immediately.
    pub fn set_sample(&mut self, sample: R::Sample, label: Label, idx: usize) {
        let n_samples = self.n_samples();
        assert!(idx <= n_samples, "slot {idx} out of range for {n_samples} samples");

        if idx == n_samples {
            let mut row = vec![0.0f32; self.n_precomputed];
            self.representation.evaluate_into(&sample, &mut row);
            // Row length always matches the column count.
            self.values
                .push_row(ndarray::ArrayView1::from(&row[..]))
                .unwrap_or_else(|err| unreachable!("row shape mismatch: {err}"));
            self.samples.push(sample);
            self.labels.push(label);
        } else {
            write_row(self.representation, &sample, self.values.row_mut(idx));
            self.samples[idx] = sample;
            self.labels[idx] = label;
        }
    }

    /// Keep only the slots whose flag is `true`, preserving their order.
    pub fn retain(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.n_samples());

        let kept: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(idx, &k)| k.then_some(idx))
            .collect();
        if kept.len() == self.n_samples() {
            return;
        }

        self.values = self.values.select(Axis(0), &kept);
        let mut flags = keep.iter();
        self.samples.retain(|_| flags.next().copied().unwrap_or(false));
        let mut flags = keep.iter();
        self.labels.retain(|_| flags.next().copied().unwrap_or(false));
    }
}

fn write_row<R: Representation>(representation: &R, sample: &R::Sample, mut row: ArrayViewMut1<'_, f32>) {
    match row.as_slice_mut() {
        Some(out) => representation.evaluate_into(sample, out),
        None => {
            for (feature, value) in row.iter_mut().enumerate() {
                *value = representation.evaluate(sample, feature);
            }
        }
    }
}

// ============================================================================
// CachedSample
// ============================================================================

/// One cache row, viewed as a [`SampleAccessor`].
pub struct CachedSample<'c, 'r, R: Representation> {
    cache: &'c FeatureCache<'r, R>,
    idx: usize,
}

impl<R: Representation> SampleAccessor for CachedSample<'_, '_, R> {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self.cache.response(index, self.idx)
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.cache.n_features()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Feature `f` of sample `s` is `s * 10 + f`; counts evaluations.
    struct Counting {
        n_features: usize,
        calls: AtomicUsize,
    }

    impl Representation for Counting {
        type Raw = f32;
        type Sample = f32;

        fn n_features(&self) -> usize {
            self.n_features
        }

        fn preprocess(&self, raw: f32) -> f32 {
            raw
        }

        fn evaluate(&self, sample: &f32, feature: usize) -> f32 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            sample * 10.0 + feature as f32
        }
    }

    fn counting(n_features: usize) -> Counting {
        Counting { n_features, calls: AtomicUsize::new(0) }
    }

    fn labels(n: usize) -> Vec<Label> {
        (0..n).map(|i| Label::from(i % 2 == 0)).collect()
    }

    #[test]
    fn full_materialization_matches_evaluation() {
        let repr = counting(4);
        let cache = FeatureCache::new(&repr, vec![0.0, 1.0, 2.0], labels(3), None, Parallelism::Parallel);

        assert_eq!(cache.n_precomputed(), 4);
        assert_eq!(repr.calls.load(Ordering::Relaxed), 12);
        for idx in 0..3 {
            for feature in 0..4 {
                assert_eq!(cache.response(feature, idx), idx as f32 * 10.0 + feature as f32);
            }
        }
        assert_eq!(repr.calls.load(Ordering::Relaxed), 12);
    }

    #[test]
    fn budget_limits_window_and_recomputes_outside() {
        let repr = counting(4);
        let cache = FeatureCache::new(&repr, vec![0.0, 1.0, 2.0], labels(3), Some(7), Parallelism::Sequential);

        // 7 / 3 samples = 2 resident features each
        assert_eq!(cache.n_precomputed(), 2);
        assert_eq!(repr.calls.load(Ordering::Relaxed), 6);

        assert_eq!(cache.response(3, 2), 23.0);
        assert_eq!(repr.calls.load(Ordering::Relaxed), 7);

        let mut out = [0.0; 2];
        cache.responses_into(1, &[2, 0], &mut out);
        assert_eq!(out, [21.0, 1.0]);
        cache.responses_into(3, &[2, 0], &mut out);
        assert_eq!(out, [23.0, 3.0]);
    }

    #[test]
    fn zero_budget_is_pure_on_demand() {
        let repr = counting(3);
        let cache = FeatureCache::new(&repr, vec![5.0], labels(1), Some(0), Parallelism::Sequential);
        assert_eq!(cache.n_precomputed(), 0);
        assert_eq!(cache.accessor(0).feature(2), 52.0);
    }

    #[test]
    fn set_sample_replaces_and_appends() {
        let repr = counting(2);
        let mut cache = FeatureCache::new(&repr, vec![0.0, 1.0], labels(2), None, Parallelism::Sequential);

        cache.set_sample(7.0, Label::Negative, 0);
        assert_eq!(cache.response(1, 0), 71.0);
        assert_eq!(cache.label(0), Label::Negative);

        cache.set_sample(9.0, Label::Positive, 2);
        assert_eq!(cache.n_samples(), 3);
        assert_eq!(cache.response(0, 2), 90.0);
        assert_eq!(cache.count(Label::Positive), 1);
    }

    #[test]
    fn retain_keeps_rows_aligned() {
        let repr = counting(2);
        let mut cache =
            FeatureCache::new(&repr, vec![0.0, 1.0, 2.0, 3.0], labels(4), None, Parallelism::Sequential);

        cache.retain(&[false, true, false, true]);
        assert_eq!(cache.n_samples(), 2);
        assert_eq!(cache.response(0, 0), 10.0);
        assert_eq!(cache.response(1, 1), 31.0);
        assert_eq!(cache.labels(), &[Label::Negative, Label::Negative]);
        assert_eq!(*cache.sample(1), 3.0);
    }
}
