//! Sample data: labels, feature evaluation and the training response cache.

mod accessor;
mod cache;
mod label;
mod representation;
mod source;

pub use accessor::{EvaluatedSample, SampleAccessor};
pub use cache::{CachedSample, FeatureCache};
pub use label::Label;
pub use representation::Representation;
pub use source::{IterSource, NegativeSource, RandomWindows, Rect, WindowImage};
