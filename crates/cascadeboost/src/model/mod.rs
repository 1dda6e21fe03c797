//! High-level model wrapper.
//!
//! - [`CascadeConfig`]: validated training configuration (builder)
//! - [`StageParams`], [`MiningParams`]: nested parameter groups
//! - [`CascadeModel`]: train, classify, store and load a cascade
//!
//! # Example
//!
//! ```ignore
//! use cascadeboost::model::{CascadeConfig, CascadeModel, StageParams};
//!
//! let config = CascadeConfig::builder()
//!     .n_stages(15)
//!     .stage(StageParams { min_tar: 0.995, max_far: 0.5, ..Default::default() })
//!     .build()?;
//! let model = CascadeModel::train(representation, raws, labels, config, None)?;
//! model.save(Path::new("detector.vjcb"))?;
//! ```

mod cascade;
mod config;
mod params;

pub use cascade::{CascadeModel, TrainError};
pub use config::{CascadeConfig, CascadeConfigBuilder, ConfigError};
pub use params::{MiningParams, ParamValidationError, StageParams};
