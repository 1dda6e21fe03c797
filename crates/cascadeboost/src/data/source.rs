//! Hard-negative sources.
//!
//! During cascade training rejected negatives are replaced by fresh raw samples
//! that the current cascade still accepts. A [`NegativeSource`] supplies those
//! candidates; [`RandomWindows`] cuts random sub-windows out of a reservoir of
//! object-free images.

use rand::{Rng, RngCore};

/// Supplier of negative-only raw samples.
///
/// The generator is passed in by the caller so mining is reproducible from a
/// single seed. Returning `None` means the source is exhausted.
pub trait NegativeSource<Raw> {
    fn draw(&mut self, rng: &mut dyn RngCore) -> Option<Raw>;
}

/// Adapts any iterator into a finite [`NegativeSource`].
///
/// The generator is ignored; samples come out in iteration order.
pub struct IterSource<I>(pub I);

impl<Raw, I: Iterator<Item = Raw>> NegativeSource<Raw> for IterSource<I> {
    fn draw(&mut self, _rng: &mut dyn RngCore) -> Option<Raw> {
        self.0.next()
    }
}

// ============================================================================
// Random sub-windows
// ============================================================================

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// An image that can hand out crops.
pub trait WindowImage {
    type Window;

    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Crop `rect`, which always lies inside the image.
    fn window(&self, rect: Rect) -> Self::Window;
}

/// Random sub-window sampler over background images.
///
/// Each draw picks an image uniformly, a relative size `s` uniform in
/// `[min_scale, 1)` and an origin uniform in the remaining `1 - s` room on each
/// axis, then crops `(cols * x, rows * y, cols * s, rows * s)`.
pub struct RandomWindows<I> {
    images: Vec<I>,
    min_scale: f32,
    remaining: Option<usize>,
}

impl<I: WindowImage> RandomWindows<I> {
    pub const DEFAULT_MIN_SCALE: f32 = 0.2;

    pub fn new(images: Vec<I>) -> Self {
        Self { images, min_scale: Self::DEFAULT_MIN_SCALE, remaining: None }
    }

    /// Smallest window side relative to the image, clamped to `[0, 0.99]`.
    pub fn with_min_scale(mut self, min_scale: f32) -> Self {
        self.min_scale = min_scale.clamp(0.0, 0.99);
        self
    }

    /// Stop after `limit` windows have been drawn.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.remaining = Some(limit);
        self
    }

    pub fn n_images(&self) -> usize {
        self.images.len()
    }

    fn sample_rect(image: &I, min_scale: f32, rng: &mut dyn RngCore) -> Rect {
        let size = rng.gen_range(min_scale..1.0f32);
        let x = rng.gen_range(0.0..=(1.0 - size));
        let y = rng.gen_range(0.0..=(1.0 - size));

        let (cols, rows) = (image.width() as f32, image.height() as f32);
        let width = ((cols * size) as usize).clamp(1, image.width().max(1));
        let height = ((rows * size) as usize).clamp(1, image.height().max(1));
        Rect {
            x: ((cols * x) as usize).min(image.width().saturating_sub(width)),
            y: ((rows * y) as usize).min(image.height().saturating_sub(height)),
            width,
            height,
        }
    }
}

impl<I: WindowImage> NegativeSource<I::Window> for RandomWindows<I> {
    fn draw(&mut self, rng: &mut dyn RngCore) -> Option<I::Window> {
        if self.images.is_empty() || self.remaining == Some(0) {
            return None;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }

        let image = &self.images[rng.gen_range(0..self.images.len())];
        let rect = Self::sample_rect(image, self.min_scale, rng);
        Some(image.window(rect))
    }
}
