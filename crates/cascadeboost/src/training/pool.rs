//! Training pool maintained between cascade stages.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::data::{EvaluatedSample, FeatureCache, Label, NegativeSource, Representation};
use crate::repr::Cascade;
use crate::utils::Parallelism;

/// The pool can no longer feed another stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PoolError {
    #[error("no positive samples passed the cascade")]
    NoPositives,

    #[error("no negative samples passed the cascade")]
    NoNegatives,
}

/// Hard-negative replenishment for one pool update.
pub struct Mining<'a, Raw> {
    pub source: &'a mut dyn NegativeSource<Raw>,
    pub rng: &'a mut dyn RngCore,
    pub max_draws_per_slot: usize,
}

/// Statistics of one pool update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolUpdate {
    pub n_pos: usize,
    pub n_neg: usize,
    pub removed_pos: usize,
    pub removed_neg: usize,
    /// Raw negatives drawn while mining.
    pub drawn: usize,
    /// Drawn negatives the cascade accepted and that entered the pool.
    pub mined: usize,
    /// Freed slots left empty.
    pub unfilled: usize,
    /// Running estimate of the cascade's false-accept rate.
    pub far_estimate: f64,
}

/// Samples, labels and cached responses of the current training set.
///
/// Invariant: after [`update`](Self::update) every sample in the pool is
/// accepted by the cascade passed to it.
pub struct TrainingPool<'r, R: Representation> {
    cache: FeatureCache<'r, R>,
    initial_pos: usize,
    initial_neg: usize,
}

impl<'r, R: Representation> TrainingPool<'r, R> {
    pub fn new(cache: FeatureCache<'r, R>) -> Self {
        let initial_pos = cache.count(Label::Positive);
        let initial_neg = cache.n_samples() - initial_pos;
        Self { cache, initial_pos, initial_neg }
    }

    #[inline]
    pub fn cache(&self) -> &FeatureCache<'r, R> {
        &self.cache
    }

    pub fn n_pos(&self) -> usize {
        self.cache.count(Label::Positive)
    }

    pub fn n_neg(&self) -> usize {
        self.cache.n_samples() - self.n_pos()
    }

    #[inline]
    pub fn initial_pos(&self) -> usize {
        self.initial_pos
    }

    #[inline]
    pub fn initial_neg(&self) -> usize {
        self.initial_neg
    }

    /// Drop every sample `cascade` rejects and optionally refill negative slots.
    ///
    /// Each rejected negative's slot is refilled in place with the first draw
    /// the cascade accepts, trying at most `max_draws_per_slot` draws. Mining
    /// stops for good once the source is exhausted.
    ///
    /// The FAR estimate is `mined / drawn` when draws were made and
    /// `n_neg / initial_neg` otherwise.
    ///
    /// # Errors
    ///
    /// [`PoolError`] when no positives or no negatives remain.
    pub fn update(
        &mut self,
        cascade: &Cascade,
        mining: Option<Mining<'_, R::Raw>>,
        parallelism: Parallelism,
    ) -> Result<PoolUpdate, PoolError> {
        let cache = &self.cache;
        let mut keep = parallelism.maybe_par_map(0..cache.n_samples(), |i| cascade.accepts(&cache.accessor(i)));

        let mut stats = PoolUpdate::default();
        for (idx, &kept) in keep.iter().enumerate() {
            if !kept {
                match self.cache.label(idx) {
                    Label::Positive => stats.removed_pos += 1,
                    Label::Negative => stats.removed_neg += 1,
                }
            }
        }

        if let Some(mining) = mining {
            self.mine(cascade, mining, &mut keep, &mut stats);
        }

        self.cache.retain(&keep);
        stats.n_pos = self.n_pos();
        stats.n_neg = self.cache.n_samples() - stats.n_pos;
        stats.far_estimate = if stats.drawn > 0 {
            stats.mined as f64 / stats.drawn as f64
        } else if self.initial_neg > 0 {
            stats.n_neg as f64 / self.initial_neg as f64
        } else {
            0.0
        };

        if stats.n_pos == 0 {
            return Err(PoolError::NoPositives);
        }
        if stats.n_neg == 0 {
            return Err(PoolError::NoNegatives);
        }
        Ok(stats)
    }

    fn mine(&mut self, cascade: &Cascade, mining: Mining<'_, R::Raw>, keep: &mut [bool], stats: &mut PoolUpdate) {
        let Mining { source, rng, max_draws_per_slot } = mining;
        let representation = self.cache.representation();
        let mut exhausted = false;

        for idx in 0..keep.len() {
            if keep[idx] || self.cache.label(idx).is_positive() {
                continue;
            }
            if exhausted {
                stats.unfilled += 1;
                continue;
            }

            let mut filled = false;
            for _ in 0..max_draws_per_slot {
                let Some(raw) = source.draw(&mut *rng) else {
                    exhausted = true;
                    break;
                };
                stats.drawn += 1;
                let sample = representation.preprocess(raw);
                if cascade.accepts(&EvaluatedSample::new(representation, &sample)) {
                    self.cache.set_sample(sample, Label::Negative, idx);
                    keep[idx] = true;
                    stats.mined += 1;
                    filled = true;
                    break;
                }
            }
            if !filled {
                stats.unfilled += 1;
            }
        }
    }
}
