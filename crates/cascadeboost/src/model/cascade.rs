//! High-level cascade model.

use std::io::{Read, Write};
use std::path::Path;

use crate::data::{EvaluatedSample, Label, NegativeSource, Representation};
use crate::io::{DeserializeError, NativeCodec, SerializeError};
use crate::repr::{Cascade, Classification};
use crate::training::{CascadeReport, CascadeTrainError, CascadeTrainer};
use crate::utils::{Parallelism, run_with_threads};

use super::config::{CascadeConfig, ConfigError};

/// Training failed before any stage could be kept.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Training(#[from] CascadeTrainError),
}

/// A trained cascade bound to the representation it was trained with.
///
/// # Example
///
/// ```ignore
/// let config = CascadeConfig::builder().n_stages(10).build()?;
/// let model = CascadeModel::train(representation, raws, labels, config, None)?;
///
/// if model.classify(window).is_accepted() { /* detection */ }
///
/// model.store(&mut file)?;
/// let loaded = CascadeModel::load(&mut file, representation)?;
/// ```
#[derive(Debug, Clone)]
pub struct CascadeModel<R: Representation> {
    representation: R,
    cascade: Cascade,
    roc_mode: bool,
    report: Option<CascadeReport>,
}

impl<R: Representation> CascadeModel<R> {
    /// Wrap an existing cascade.
    ///
    /// # Errors
    ///
    /// [`DeserializeError::FeatureCountMismatch`] when the cascade was built
    /// for a different feature space.
    pub fn from_cascade(representation: R, cascade: Cascade, roc_mode: bool) -> Result<Self, DeserializeError> {
        let expected = representation.n_features();
        if cascade.n_features() != expected {
            return Err(DeserializeError::FeatureCountMismatch { expected, found: cascade.n_features() });
        }
        Ok(Self { representation, cascade, roc_mode, report: None })
    }

    // =========================================================================
    // Training
    // =========================================================================

    /// Train a cascade on raw samples.
    ///
    /// The representation is adapted to the preprocessed samples before any
    /// response is cached. `negatives` feeds hard-negative mining when
    /// `config.mining` is set.
    ///
    /// # Errors
    ///
    /// [`TrainError::Config`] for invalid settings or inputs, and
    /// [`TrainError::Training`] when not even one stage could be trained.
    pub fn train(
        mut representation: R,
        raws: Vec<R::Raw>,
        labels: Vec<Label>,
        config: CascadeConfig,
        negatives: Option<&mut (dyn NegativeSource<R::Raw> + Send)>,
    ) -> Result<Self, TrainError>
    where
        R: Send,
    {
        config.validate()?;
        if raws.len() != labels.len() {
            return Err(ConfigError::LengthMismatch { n_samples: raws.len(), n_labels: labels.len() }.into());
        }
        if representation.n_features() == 0 {
            return Err(ConfigError::NoFeatures.into());
        }

        let trainer = CascadeTrainer::new(config.to_trainer_params());
        let repr = &mut representation;
        let (cascade, report) = run_with_threads(config.n_threads(), move |parallelism| {
            let samples = parallelism.maybe_par_map(raws, |raw| repr.preprocess(raw));
            repr.train(&samples, &labels);
            let negatives = negatives.map(|source| source as &mut dyn NegativeSource<R::Raw>);
            trainer.train(&*repr, samples, labels, negatives, parallelism)
        })?;

        Ok(Self { representation, cascade, roc_mode: config.roc_mode, report: Some(report) })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    #[inline]
    pub fn representation(&self) -> &R {
        &self.representation
    }

    /// Report of the training run; `None` for loaded models.
    pub fn report(&self) -> Option<&CascadeReport> {
        self.report.as_ref()
    }

    #[inline]
    pub fn roc_mode(&self) -> bool {
        self.roc_mode
    }

    pub fn set_roc_mode(&mut self, roc_mode: bool) {
        self.roc_mode = roc_mode;
    }

    // =========================================================================
    // Inference
    // =========================================================================

    pub fn classify(&self, raw: R::Raw) -> Classification {
        let sample = self.representation.preprocess(raw);
        self.classify_sample(&sample)
    }

    /// Classify an already preprocessed sample. Features are evaluated lazily.
    pub fn classify_sample(&self, sample: &R::Sample) -> Classification {
        self.cascade.classify(&EvaluatedSample::new(&self.representation, sample))
    }

    /// Detector confidence; see [`Cascade::confidence`].
    pub fn confidence(&self, raw: R::Raw) -> f32 {
        let sample = self.representation.preprocess(raw);
        self.cascade.confidence(&EvaluatedSample::new(&self.representation, &sample), self.roc_mode)
    }

    /// Classify a batch of raws, in order.
    pub fn classify_batch(&self, raws: Vec<R::Raw>, n_threads: usize) -> Vec<Classification> {
        run_with_threads(n_threads, |parallelism: Parallelism| {
            parallelism.maybe_par_map(raws, |raw| self.classify(raw))
        })
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn store<W: Write>(&self, writer: &mut W) -> Result<(), SerializeError> {
        NativeCodec::write_to(&self.cascade, writer)
    }

    /// Read a cascade and bind it to `representation`.
    ///
    /// Loaded models start with `roc_mode` off.
    pub fn load<Rd: Read>(reader: &mut Rd, representation: R) -> Result<Self, DeserializeError> {
        let cascade = NativeCodec::read_from(reader)?;
        Self::from_cascade(representation, cascade, false)
    }

    pub fn save(&self, path: &Path) -> Result<(), SerializeError> {
        crate::io::write_cascade_file(path, &self.cascade)
    }

    pub fn load_file(path: &Path, representation: R) -> Result<Self, DeserializeError> {
        let cascade = crate::io::read_cascade_file(path)?;
        Self::from_cascade(representation, cascade, false)
    }
}
