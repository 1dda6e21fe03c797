//! Training infrastructure for boosted cascades.
//!
//! ## Weak learners
//!
//! - [`BoostType`], [`BoostState`]: Discrete, Real, Logit and Gentle boosting
//! - [`SplitCriterion`]: Node impurity used by the tree grower
//! - [`TreeGrower`]: Depth-limited tree growth over cached responses
//!
//! ## Stages and cascades
//!
//! - [`StageTrainer`]: Adds trees until a stage meets its TAR/FAR target
//! - [`TrainingPool`]: Filters and replenishes samples between stages
//! - [`CascadeTrainer`]: Chains stages until the FAR budget is met
//! - [`TrainingLogger`], [`Verbosity`]: Structured logging

mod boost;
mod cascade;
mod grower;
mod logger;
mod pool;
mod split;
mod stage;

pub use boost::{BoostState, BoostType, trim_mask};
pub use cascade::{CascadeParams, CascadeReport, CascadeStop, CascadeTrainError, CascadeTrainer};
pub use grower::{TreeFitError, TreeGrower};
pub use logger::{TrainingLogger, Verbosity};
pub use pool::{Mining, PoolError, PoolUpdate, TrainingPool};
pub use split::{NodeStats, SplitCandidate, SplitCriterion};
pub use stage::{StageError, StageRates, StageReport, StageStop, StageTrainer};
