//! Extractor source registry.
//!
//! Extractors load by source reference, a string naming where the
//! pretrained weights come from (a hub URL, or a `builtin/` id for the
//! extractors compiled into this crate). A factory registered under a
//! source builds a fresh extractor each time the source is loaded; loading
//! an unregistered source is fatal to the caller and never retried.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::TrillheadError;
use crate::extractor::EmbeddingExtractor;
use crate::spectral::{SpectralConfig, SpectralStatsExtractor};

/// Well-known extractor source references.
pub struct ExtractorSource;

impl ExtractorSource {
    /// TRILLsson-5 paralinguistic speech embeddings.
    ///
    /// Input: batches of 16 kHz float waveforms in `[-1, 1]`.
    /// Output `"embedding"`: 1024 values per clip.
    ///
    /// The default source for [`Classifier::from_source`]; the hosting
    /// application registers a factory for it (a TFLite or ONNX runner)
    /// before building classifiers.
    ///
    /// [`Classifier::from_source`]: crate::Classifier::from_source
    pub const TRILLSSON5: &str = "https://tfhub.dev/google/trillsson5/1";

    /// Builtin mel-band spectral statistics extractor.
    ///
    /// Pure DSP, no pretrained weights; always available after
    /// [`register_builtin_extractors`].
    pub const SPECTRAL_STATS: &str = "builtin/spectral-stats";
}

/// Builds a ready-to-use extractor for a registered source.
pub type ExtractorFactory =
    Box<dyn Fn() -> Result<Box<dyn EmbeddingExtractor>, TrillheadError> + Send + Sync>;

static REGISTRY: Lazy<Mutex<HashMap<String, ExtractorFactory>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Registers `factory` under `source`. Registering the same source again
/// replaces the previous factory.
pub fn register_extractor(source: &str, factory: ExtractorFactory) {
    let mut registry = REGISTRY.lock().unwrap();
    if registry.insert(source.to_string(), factory).is_some() {
        warn!(source = %source, "hub: extractor source re-registered");
    }
}

/// Builds an extractor for `source`.
///
/// Returns [`TrillheadError::SourceNotRegistered`] for unknown sources and
/// propagates factory failures as-is. There is no retry; a failed load
/// means the model cannot be assembled.
pub fn load_extractor(source: &str) -> Result<Box<dyn EmbeddingExtractor>, TrillheadError> {
    let registry = REGISTRY.lock().unwrap();
    let factory = registry
        .get(source)
        .ok_or_else(|| TrillheadError::SourceNotRegistered(source.to_string()))?;
    let extractor = factory()?;
    debug!(source = %source, "hub: extractor loaded");
    Ok(extractor)
}

/// Source references of all registered extractors, in no particular order.
pub fn list_sources() -> Vec<String> {
    REGISTRY.lock().unwrap().keys().cloned().collect()
}

/// Registers the extractors compiled into this crate. Idempotent: sources
/// already registered, builtin or otherwise, are left untouched.
pub fn register_builtin_extractors() {
    let mut registry = REGISTRY.lock().unwrap();
    registry
        .entry(ExtractorSource::SPECTRAL_STATS.to_string())
        .or_insert_with(|| {
            Box::new(|| {
                Ok(Box::new(SpectralStatsExtractor::new(SpectralConfig::default()))
                    as Box<dyn EmbeddingExtractor>)
            })
        });
}
