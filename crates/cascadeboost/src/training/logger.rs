//! Training progress logging.
//!
//! [`TrainingLogger`] filters events by [`Verbosity`] and forwards them to the
//! `log` facade, so the application picks the backend.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How much training output to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verbosity {
    /// Nothing.
    #[default]
    Silent,
    /// Recovered failures only (degenerate trees, exhausted pools, checkpoint errors).
    Warning,
    /// Per-stage summaries.
    Info,
    /// Per-tree rows and mining statistics.
    Debug,
}

/// Verbosity-gated logger for one training run.
#[derive(Debug)]
pub struct TrainingLogger {
    verbosity: Verbosity,
    started: Option<Instant>,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity, started: None }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[inline]
    fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    pub fn start_training(&mut self, n_stages: usize, n_pos: usize, n_neg: usize) {
        self.started = Some(Instant::now());
        if self.enabled(Verbosity::Info) {
            log::info!("training cascade: up to {n_stages} stages, {n_pos} positives, {n_neg} negatives");
        }
    }

    /// Pool statistics at the start of a stage, relative to the initial pool.
    pub fn log_stage_start(&self, stage: usize, n_pos: usize, n_neg: usize, initial_pos: usize, initial_neg: usize) {
        if self.enabled(Verbosity::Info) {
            log::info!(
                "===== stage {stage} ===== POS {n_pos} ({:.4}) NEG {n_neg} ({:.6})",
                ratio(n_pos, initial_pos),
                ratio(n_neg, initial_neg),
            );
        }
    }

    /// One row per appended weak tree.
    pub fn log_tree(&self, n_trees: usize, tar: f32, far: f32) {
        if self.enabled(Verbosity::Debug) {
            log::debug!("| {n_trees:>4} | TAR {tar:.6} | FAR {far:.6} |");
        }
    }

    pub fn log_stage_done(&self, stage: usize, n_trees: usize, threshold: f32, tar: f32, far: f32) {
        if self.enabled(Verbosity::Info) {
            log::info!("stage {stage}: {n_trees} trees, threshold {threshold:.6}, TAR {tar:.6}, FAR {far:.6}");
        }
    }

    pub fn log_mining(&self, drawn: usize, accepted: usize, unfilled: usize) {
        if self.enabled(Verbosity::Debug) {
            log::debug!("mining: {accepted}/{drawn} draws accepted, {unfilled} slots unfilled");
        }
    }

    pub fn log_pool(&self, n_pos: usize, n_neg: usize, far_estimate: f64) {
        if self.enabled(Verbosity::Info) {
            log::info!("pool after filtering: POS {n_pos}, NEG {n_neg}, cumulative FAR {far_estimate:.6}");
        }
    }

    /// Recovered failure.
    pub fn warn(&self, message: std::fmt::Arguments<'_>) {
        if self.enabled(Verbosity::Warning) {
            log::warn!("{message}");
        }
    }

    pub fn log_stop(&self, reason: &dyn std::fmt::Display) {
        if self.enabled(Verbosity::Info) {
            log::info!("cascade stopped: {reason}");
        }
    }

    /// Log and return time since [`start_training`](Self::start_training).
    pub fn finish_training(&self) -> Duration {
        let elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
        if self.enabled(Verbosity::Info) {
            log::info!("training finished in {:.3}s", elapsed.as_secs_f64());
        }
        elapsed
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { count as f64 / total as f64 }
}
