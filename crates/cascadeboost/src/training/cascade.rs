//! Cascade trainer: chains boosted stages and reshapes the pool between them.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::data::{FeatureCache, Label, NegativeSource, Representation};
use crate::model::{ConfigError, MiningParams, StageParams};
use crate::repr::Cascade;
use crate::utils::Parallelism;

use super::logger::{TrainingLogger, Verbosity};
use super::pool::{Mining, PoolError, PoolUpdate, TrainingPool};
use super::split::SplitCriterion;
use super::stage::{StageError, StageReport, StageTrainer};

// ============================================================================
// Parameters
// ============================================================================

/// Trainer-level cascade parameters.
///
/// Built from [`CascadeConfig`](crate::model::CascadeConfig) after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeParams {
    pub n_stages: u32,
    /// Cumulative false-accept budget of the whole cascade.
    pub max_far: f32,
    pub stage: StageParams,
    pub split_criterion: Option<SplitCriterion>,
    pub min_samples_leaf: u32,
    pub threshold_epsilon: f32,
    /// Maximum number of cached responses; `None` caches every feature.
    pub precompute_budget: Option<usize>,
    pub mining: Option<MiningParams>,
    pub seed: u64,
    pub verbosity: Verbosity,
    pub checkpoint: Option<PathBuf>,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            n_stages: 20,
            max_far: 0.005,
            stage: StageParams::default(),
            split_criterion: None,
            min_samples_leaf: 1,
            threshold_epsilon: f32::EPSILON,
            precompute_budget: None,
            mining: None,
            seed: 42,
            verbosity: Verbosity::Silent,
            checkpoint: None,
        }
    }
}

impl CascadeParams {
    /// Validate every cascade, stage and mining parameter.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_stages == 0 {
            return Err(ConfigError::InvalidNStages);
        }
        if !(self.max_far > 0.0 && self.max_far < 1.0) {
            return Err(ConfigError::InvalidMaxFar(self.max_far));
        }
        if self.min_samples_leaf == 0 {
            return Err(ConfigError::InvalidMinSamplesLeaf);
        }
        if !(self.threshold_epsilon.is_finite() && self.threshold_epsilon >= 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.threshold_epsilon));
        }
        self.stage.validate()?;
        if let Some(mining) = &self.mining {
            mining.validate().map_err(ConfigError::InvalidMining)?;
        }
        Ok(())
    }
}

// ============================================================================
// Errors and reports
// ============================================================================

/// Training produced no usable cascade.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CascadeTrainError {
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ConfigError),

    #[error("initial pool is unusable: {0}")]
    EmptyPool(#[source] PoolError),

    #[error("first stage failed: {0}")]
    FirstStage(#[source] StageError),
}

/// Why the cascade stopped adding stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CascadeStop {
    StageLimit,
    PoolExhausted(PoolError),
    /// Cumulative FAR met the cascade budget.
    FarReached,
    /// Cumulative FAR met `stage.max_far ^ n_stages`.
    LeafFarReached,
    /// The last stage rejected no negatives and none were mined, so the next
    /// stage would see the same pool.
    NoNegativesRejected,
    StageFailed(StageError),
}

impl fmt::Display for CascadeStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageLimit => write!(f, "stage limit reached"),
            Self::PoolExhausted(err) => write!(f, "pool exhausted ({err})"),
            Self::FarReached => write!(f, "cascade FAR budget met"),
            Self::LeafFarReached => write!(f, "per-stage FAR target met"),
            Self::NoNegativesRejected => write!(f, "pool unchanged by the last stage"),
            Self::StageFailed(err) => write!(f, "stage failed ({err})"),
        }
    }
}

/// Summary of a cascade training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub stages: Vec<StageReport>,
    /// One entry per pool update, i.e. per stage except possibly the last.
    pub pool_updates: Vec<PoolUpdate>,
    /// Last cumulative FAR estimate; 1 before the first pool update.
    pub far_estimate: f64,
    pub stop: CascadeStop,
    pub elapsed: Duration,
}

// ============================================================================
// CascadeTrainer
// ============================================================================

/// Trains a [`Cascade`] stage by stage.
#[derive(Debug, Clone)]
pub struct CascadeTrainer {
    params: CascadeParams,
}

impl CascadeTrainer {
    pub fn new(params: CascadeParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &CascadeParams {
        &self.params
    }

    /// Train on preprocessed `samples`.
    ///
    /// After each stage the pool is filtered by the cascade so far and, when
    /// both `negatives` and mining parameters are given, rejected negative
    /// slots are refilled with hard negatives.
    ///
    /// # Errors
    ///
    /// When the parameters are invalid, the initial pool lacks a class or the
    /// first stage fails. Every later failure ends training with the stages
    /// trained so far.
    pub fn train<R: Representation>(
        &self,
        representation: &R,
        samples: Vec<R::Sample>,
        labels: Vec<Label>,
        mut negatives: Option<&mut dyn NegativeSource<R::Raw>>,
        parallelism: Parallelism,
    ) -> Result<(Cascade, CascadeReport), CascadeTrainError> {
        let params = &self.params;
        params.validate()?;
        let mut logger = TrainingLogger::new(params.verbosity);

        let cache = FeatureCache::new(representation, samples, labels, params.precompute_budget, parallelism);
        let mut pool = TrainingPool::new(cache);
        if pool.initial_pos() == 0 {
            return Err(CascadeTrainError::EmptyPool(PoolError::NoPositives));
        }
        if pool.initial_neg() == 0 {
            return Err(CascadeTrainError::EmptyPool(PoolError::NoNegatives));
        }

        let stage_trainer = StageTrainer::new(
            params.stage.clone(),
            params.split_criterion,
            params.min_samples_leaf,
            params.threshold_epsilon,
        );
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        let leaf_far = f64::from(params.stage.max_far).powi(params.n_stages as i32);

        let mut cascade = Cascade::new(representation.n_features());
        let mut stages = Vec::new();
        let mut pool_updates = Vec::new();
        let mut far_estimate = 1.0;

        logger.start_training(params.n_stages as usize, pool.initial_pos(), pool.initial_neg());

        let stop = loop {
            let index = cascade.n_stages();
            logger.log_stage_start(index, pool.n_pos(), pool.n_neg(), pool.initial_pos(), pool.initial_neg());

            let (stage, report) = match stage_trainer.train(pool.cache(), &logger, parallelism) {
                Ok(trained) => trained,
                Err(err) if index == 0 => return Err(CascadeTrainError::FirstStage(err)),
                Err(err) => {
                    logger.warn(format_args!("stage {index} failed: {err}"));
                    break CascadeStop::StageFailed(err);
                }
            };
            logger.log_stage_done(index, report.n_trees, report.threshold, report.tar, report.far);
            cascade.push_stage(stage);
            stages.push(report);
            self.write_checkpoint(&cascade, &logger);

            if cascade.n_stages() >= params.n_stages as usize {
                break CascadeStop::StageLimit;
            }

            let mining = match (negatives.as_deref_mut(), params.mining) {
                (Some(source), Some(mining)) => Some(Mining {
                    source,
                    rng: &mut rng,
                    max_draws_per_slot: mining.max_draws_per_slot,
                }),
                _ => None,
            };
            let update = match pool.update(&cascade, mining, parallelism) {
                Ok(update) => update,
                Err(err) => {
                    logger.warn(format_args!("pool update after stage {index} failed: {err}"));
                    break CascadeStop::PoolExhausted(err);
                }
            };
            if update.drawn > 0 {
                logger.log_mining(update.drawn, update.mined, update.unfilled);
            }
            logger.log_pool(update.n_pos, update.n_neg, update.far_estimate);
            far_estimate = update.far_estimate;
            pool_updates.push(update);

            if far_estimate <= f64::from(params.max_far) {
                break CascadeStop::FarReached;
            }
            if far_estimate <= leaf_far {
                break CascadeStop::LeafFarReached;
            }
            if update.removed_neg == 0 && update.drawn == 0 {
                logger.warn(format_args!("stage {index} rejected no negatives"));
                break CascadeStop::NoNegativesRejected;
            }
        };

        logger.log_stop(&stop);
        let elapsed = logger.finish_training();
        let report = CascadeReport { stages, pool_updates, far_estimate, stop, elapsed };
        Ok((cascade, report))
    }

    fn write_checkpoint(&self, cascade: &Cascade, logger: &TrainingLogger) {
        let Some(path) = &self.params.checkpoint else {
            return;
        };
        if let Err(err) = crate::io::write_cascade_file(path, cascade) {
            logger.warn(format_args!("checkpoint to {} failed: {err}", path.display()));
        }
    }
}
