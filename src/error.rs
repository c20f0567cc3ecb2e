use thiserror::Error;

/// Errors returned by trillhead operations.
#[derive(Debug, Error)]
pub enum TrillheadError {
    /// No extractor factory is registered under the requested source
    /// reference. Loading never retries; fix the registration and restart.
    #[error("trillhead: extractor source not registered: {0}")]
    SourceNotRegistered(String),

    /// A registered factory failed to produce a working extractor.
    #[error("trillhead: extractor load failed: {0}")]
    ExtractorLoad(String),

    /// The extractor does not expose the requested named output.
    #[error("trillhead: extractor has no output named {0:?}")]
    MissingOutput(String),

    /// Two tensors that must agree in size do not.
    #[error("trillhead: shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// The waveform is shorter than one analysis frame.
    #[error("trillhead: audio too short: need {min_samples} samples, got {got_samples}")]
    AudioTooShort { min_samples: usize, got_samples: usize },

    /// Training and evaluation require at least one example.
    #[error("trillhead: empty batch")]
    EmptyBatch,

    /// The extractor reported a failure of its own.
    #[error("trillhead: extractor error: {0}")]
    Extractor(String),

    /// A weight file could not be parsed or does not fit the model.
    #[error("trillhead: weight file error: {0}")]
    WeightFile(String),
}
