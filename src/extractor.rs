//! Pretrained embedding extractor interface.

use crate::error::TrillheadError;

/// Name of the extractor output the classification head consumes.
pub const EMBEDDING_OUTPUT: &str = "embedding";

/// Turns raw audio waveforms into fixed-size embedding vectors.
///
/// An extractor is a frozen, pretrained component: the classifier calls it
/// for features and never updates it. Implementations expose one or more
/// named outputs; anything conforming to this interface can stand in for
/// the default pretrained network, and swapping implementations leaves the
/// classifier's output shape unchanged.
///
/// # Audio Requirements
///
/// - Mono float samples in `[-1.0, 1.0]`
/// - 16 kHz sample rate
/// - One clip per batch row; rows may differ in length
///
/// The contract is documented, not enforced: implementations are free to
/// accept whatever they can make sense of.
///
/// # Named Outputs
///
/// Every implementation must expose [`EMBEDDING_OUTPUT`] with a fixed row
/// width, which is the only output the classifier selects. Additional
/// outputs (attention maps, intermediate features) may be exposed under
/// other names for callers that want them.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one loaded extractor is expected
/// to serve concurrent callers.
pub trait EmbeddingExtractor: Send + Sync {
    /// Names of the outputs this extractor exposes.
    fn output_names(&self) -> Vec<String>;

    /// Row width produced for `output`, or `None` if the name is not
    /// exposed.
    fn dimension(&self, output: &str) -> Option<usize>;

    /// Runs the extractor over a batch and returns one row per waveform
    /// for the selected output.
    fn extract(
        &self,
        waveforms: &[Vec<f32>],
        output: &str,
    ) -> Result<Vec<Vec<f32>>, TrillheadError>;

    /// Row width of the default [`EMBEDDING_OUTPUT`], when exposed.
    fn embedding_dimension(&self) -> Option<usize> {
        self.dimension(EMBEDDING_OUTPUT)
    }
}

/// Trait objects format opaquely; implementations themselves are not
/// required to be `Debug`.
impl std::fmt::Debug for dyn EmbeddingExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn EmbeddingExtractor>")
    }
}
