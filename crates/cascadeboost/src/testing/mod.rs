//! Seeded synthetic data and a pass-through representation for tests and
//! benchmarks.

use rand::prelude::*;

use crate::data::{Label, Rect, Representation, WindowImage};

/// Identity representation: a sample is already its feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarRepresentation {
    n_features: usize,
}

impl ScalarRepresentation {
    pub fn new(n_features: usize) -> Self {
        Self { n_features }
    }
}

impl Representation for ScalarRepresentation {
    type Raw = Vec<f32>;
    type Sample = Vec<f32>;

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn preprocess(&self, raw: Vec<f32>) -> Vec<f32> {
        raw
    }

    fn evaluate(&self, sample: &Vec<f32>, feature: usize) -> f32 {
        sample[feature]
    }

    fn evaluate_into(&self, sample: &Vec<f32>, out: &mut [f32]) {
        out.copy_from_slice(&sample[..out.len()]);
    }
}

/// One-feature samples at `label + noise`, noise uniform in `[-noise, noise]`.
///
/// Positives (value 1) come first, then negatives (value 0).
pub fn two_clusters(n_pos: usize, n_neg: usize, noise: f32, seed: u64) -> (Vec<Vec<f32>>, Vec<Label>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(n_pos + n_neg);
    let mut labels = Vec::with_capacity(n_pos + n_neg);
    for (count, label) in [(n_pos, Label::Positive), (n_neg, Label::Negative)] {
        let center = if label.is_positive() { 1.0 } else { 0.0 };
        for _ in 0..count {
            samples.push(vec![center + (rng.r#gen::<f32>() * 2.0 - 1.0) * noise]);
            labels.push(label);
        }
    }
    (samples, labels)
}

/// Multi-feature samples where feature `j` shifts positives by `(j + 1) / n_features`
/// on top of uniform noise in `[0, 1)`. Positives come first.
pub fn noisy_features(n_pos: usize, n_neg: usize, n_features: usize, seed: u64) -> (Vec<Vec<f32>>, Vec<Label>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(n_pos + n_neg);
    let mut labels = Vec::with_capacity(n_pos + n_neg);
    for (count, label) in [(n_pos, Label::Positive), (n_neg, Label::Negative)] {
        for _ in 0..count {
            let sample = (0..n_features)
                .map(|j| {
                    let shift = if label.is_positive() { (j + 1) as f32 / n_features as f32 } else { 0.0 };
                    rng.r#gen::<f32>() + shift
                })
                .collect();
            samples.push(sample);
            labels.push(label);
        }
    }
    (samples, labels)
}

/// One-feature raw negatives uniform in `[min, max)`.
pub fn random_negatives(n: usize, min: f32, max: f32, seed: u64) -> Vec<Vec<f32>> {
    assert!(max >= min);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| vec![min + rng.r#gen::<f32>() * (max - min)]).collect()
}

/// Grayscale image whose windows reduce to their mean intensity.
///
/// Pairs with a one-feature [`ScalarRepresentation`] for mining tests.
#[derive(Debug, Clone)]
pub struct MeanImage {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
}

impl MeanImage {
    /// Random pixels uniform in `[min, max)`.
    pub fn random(width: usize, height: usize, min: f32, max: f32, seed: u64) -> Self {
        let pixels = random_negatives(width * height, min, max, seed).into_iter().map(|p| p[0]).collect();
        Self { width, height, pixels }
    }
}

impl WindowImage for MeanImage {
    type Window = Vec<f32>;

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn window(&self, rect: Rect) -> Vec<f32> {
        let mut sum = 0.0f64;
        for y in rect.y..rect.y + rect.height {
            let row = &self.pixels[y * self.width..(y + 1) * self.width];
            sum += row[rect.x..rect.x + rect.width].iter().map(|&p| p as f64).sum::<f64>();
        }
        vec![(sum / (rect.width * rect.height) as f64) as f32]
    }
}
