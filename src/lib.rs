//! Binary audio classification heads on pretrained speech embeddings.
//!
//! # Architecture
//!
//! A [`Classifier`] is assembled from two parts:
//!
//! 1. A frozen [`EmbeddingExtractor`] loaded by source reference, which
//!    turns raw 16 kHz waveforms into one fixed-size `"embedding"` vector
//!    per clip.
//! 2. A trainable head: flatten, `Dense(1000, ReLU)`, `Dense(1, sigmoid)`,
//!    compiled with an [`Adam`] optimizer, binary cross-entropy loss and
//!    the [`metrics::f1`] monitor.
//!
//! Assembly returns a ready-to-train model; no training happens inside.
//! Any type conforming to [`EmbeddingExtractor`] can stand in for the
//! pretrained network, and swapping extractors leaves the classifier's
//! output shape unchanged.
//!
//! # Example
//!
//! ```
//! use trillhead::{Classifier, ExtractorSource};
//!
//! trillhead::register_builtin_extractors();
//! let model = Classifier::from_source(ExtractorSource::SPECTRAL_STATS).unwrap();
//!
//! // One second of silence, one clip in the batch.
//! let batch = vec![vec![0.0f32; 16_000]];
//! let probs = model.predict(&batch).unwrap();
//! assert_eq!(probs.len(), 1);
//! assert!(probs[0] >= 0.0 && probs[0] <= 1.0);
//! ```
//!
//! # Extractor sources
//!
//! Extractors load through a process-global registry keyed by source
//! reference: a hub URL such as [`ExtractorSource::TRILLSSON5`] (the
//! default pretrained network, registered by the hosting application) or
//! a `builtin/` id such as [`ExtractorSource::SPECTRAL_STATS`] (pure DSP,
//! compiled in). Loading an unregistered source is fatal and never
//! retried.

mod adam;
mod classifier;
mod dense;
mod error;
mod extractor;
mod hub;
mod loss;
pub mod metrics;
mod spectral;

pub use adam::{Adam, AdamConfig};
pub use classifier::{BatchReport, Classifier, ClassifierConfig, Metric, MetricFn};
pub use dense::{Activation, Dense};
pub use error::TrillheadError;
pub use extractor::{EMBEDDING_OUTPUT, EmbeddingExtractor};
pub use hub::{
    ExtractorFactory, ExtractorSource, list_sources, load_extractor,
    register_builtin_extractors, register_extractor,
};
pub use loss::binary_cross_entropy;
pub use metrics::{EPSILON, f1, precision, recall};
pub use spectral::{BAND_ENERGY_OUTPUT, SpectralConfig, SpectralStatsExtractor};
