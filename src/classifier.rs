//! Binary classifier assembly: frozen extractor plus a trainable dense head.
//!
//! [`Classifier::from_source`] mirrors the usual transfer-learning recipe:
//! load a pretrained embedding extractor by source reference, flatten its
//! `"embedding"` output, stack a 1000-unit ReLU layer and a single sigmoid
//! unit on top, and compile the result with Adam, binary cross-entropy and
//! an F1 monitor. The assembled model is ready to train; no training
//! happens during assembly.
//!
//! Only the two dense layers ever receive gradient. The extractor is held
//! behind `&self` and cannot be updated through this type.

use tracing::debug;

use crate::adam::{Adam, AdamConfig};
use crate::dense::{Activation, Dense};
use crate::error::TrillheadError;
use crate::extractor::{EMBEDDING_OUTPUT, EmbeddingExtractor};
use crate::hub;
use crate::loss::binary_cross_entropy;
use crate::metrics;

/// Signature shared by all monitoring metrics: labels and predictions in,
/// score out.
pub type MetricFn = fn(&[f32], &[f32]) -> Result<f32, TrillheadError>;

/// A named monitoring metric attached to the compiled model.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    pub name: &'static str,
    pub eval: MetricFn,
}

impl Metric {
    /// The F1 monitor, [`metrics::f1`].
    pub fn f1() -> Self {
        Self { name: "f1", eval: metrics::f1 }
    }

    pub fn precision() -> Self {
        Self { name: "precision", eval: metrics::precision }
    }

    pub fn recall() -> Self {
        Self { name: "recall", eval: metrics::recall }
    }
}

/// Controls head assembly and compilation.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Width of the hidden ReLU layer.
    pub hidden_units: usize,
    /// Seed for the head's weight initialization.
    pub seed: u64,
    pub optimizer: AdamConfig,
    /// Metrics reported by [`Classifier::train_batch`] and
    /// [`Classifier::evaluate`].
    pub metrics: Vec<Metric>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            hidden_units: 1000,
            seed: 42,
            optimizer: AdamConfig::default(),
            metrics: vec![Metric::f1()],
        }
    }
}

/// Loss and metric values for one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Mean binary cross-entropy.
    pub loss: f32,
    /// One `(name, value)` entry per configured metric, in config order.
    pub metrics: Vec<(String, f32)>,
}

impl BatchReport {
    /// Value of the named metric, if it was configured.
    pub fn metric(&self, name: &str) -> Option<f32> {
        self.metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v)
    }
}

/// A compiled binary audio classifier.
///
/// Waveforms flow through the frozen extractor's `"embedding"` output,
/// are flattened to one feature row per clip, then through
/// `Dense(hidden_units, ReLU)` and `Dense(1, sigmoid)`. The sigmoid output
/// is the probability of the positive class.
#[derive(Debug)]
pub struct Classifier {
    extractor: Box<dyn EmbeddingExtractor>,
    embedding_dim: usize,
    hidden: Dense,
    output: Dense,
    optimizer: Adam,
    slot_hidden_w: usize,
    slot_hidden_b: usize,
    slot_output_w: usize,
    slot_output_b: usize,
    metrics: Vec<Metric>,
}

impl Classifier {
    /// Assembles a classifier on the extractor registered under `source`,
    /// with default configuration. See [`ExtractorSource::TRILLSSON5`] for
    /// the conventional pretrained source.
    ///
    /// Load failures are fatal: an unregistered source or a failing
    /// factory errors out with no retry.
    ///
    /// [`ExtractorSource::TRILLSSON5`]: crate::ExtractorSource::TRILLSSON5
    pub fn from_source(source: &str) -> Result<Self, TrillheadError> {
        Self::from_source_with_config(source, ClassifierConfig::default())
    }

    /// Like [`from_source`](Self::from_source) with explicit configuration.
    pub fn from_source_with_config(
        source: &str,
        cfg: ClassifierConfig,
    ) -> Result<Self, TrillheadError> {
        let extractor = hub::load_extractor(source)?;
        Self::from_extractor(extractor, cfg)
    }

    /// Assembles a classifier on an already-loaded extractor.
    ///
    /// The extractor must expose [`EMBEDDING_OUTPUT`] with a nonzero
    /// width; the head shapes itself to that width.
    pub fn from_extractor(
        extractor: Box<dyn EmbeddingExtractor>,
        cfg: ClassifierConfig,
    ) -> Result<Self, TrillheadError> {
        assert!(
            cfg.hidden_units > 0,
            "trillhead: ClassifierConfig.hidden_units must be positive"
        );
        let embedding_dim = extractor
            .dimension(EMBEDDING_OUTPUT)
            .ok_or_else(|| TrillheadError::MissingOutput(EMBEDDING_OUTPUT.to_string()))?;
        if embedding_dim == 0 {
            return Err(TrillheadError::Extractor(
                "extractor reports a zero-width embedding".to_string(),
            ));
        }
        let hidden = Dense::new(embedding_dim, cfg.hidden_units, Activation::Relu, cfg.seed);
        let output = Dense::new(cfg.hidden_units, 1, Activation::Sigmoid, cfg.seed.wrapping_add(1));
        let mut optimizer = Adam::new(cfg.optimizer);
        let slot_hidden_w = optimizer.add_slot(embedding_dim * cfg.hidden_units);
        let slot_hidden_b = optimizer.add_slot(cfg.hidden_units);
        let slot_output_w = optimizer.add_slot(cfg.hidden_units);
        let slot_output_b = optimizer.add_slot(1);
        debug!(
            embedding_dim,
            hidden_units = cfg.hidden_units,
            "classifier: head assembled"
        );
        Ok(Self {
            extractor,
            embedding_dim,
            hidden,
            output,
            optimizer,
            slot_hidden_w,
            slot_hidden_b,
            slot_output_w,
            slot_output_b,
            metrics: cfg.metrics,
        })
    }

    /// Width of the extractor embedding feeding the head.
    pub fn embedding_dimension(&self) -> usize {
        self.embedding_dim
    }

    pub fn hidden_units(&self) -> usize {
        self.hidden.units()
    }

    /// Completed training steps.
    pub fn steps(&self) -> u64 {
        self.optimizer.steps()
    }

    /// Positive-class probability for each waveform, in batch order.
    /// An empty batch yields an empty vector.
    pub fn predict(&self, waveforms: &[Vec<f32>]) -> Result<Vec<f32>, TrillheadError> {
        if waveforms.is_empty() {
            return Ok(Vec::new());
        }
        let features = self.features(waveforms)?;
        let hidden = self.hidden.forward(&features);
        let out = self.output.forward(&hidden);
        Ok(out.into_iter().map(|row| row[0]).collect())
    }

    /// Runs one training step on a labeled batch.
    ///
    /// Performs a forward pass, reports loss and metrics on the
    /// pre-update predictions, then backpropagates through the two dense
    /// layers and applies a single Adam step. The extractor stays frozen.
    ///
    /// Errors with [`TrillheadError::EmptyBatch`] on an empty batch and
    /// [`TrillheadError::ShapeMismatch`] when labels and waveforms
    /// disagree in count.
    pub fn train_batch(
        &mut self,
        waveforms: &[Vec<f32>],
        labels: &[f32],
    ) -> Result<BatchReport, TrillheadError> {
        if waveforms.is_empty() {
            return Err(TrillheadError::EmptyBatch);
        }
        if labels.len() != waveforms.len() {
            return Err(TrillheadError::ShapeMismatch {
                expected: waveforms.len(),
                got: labels.len(),
            });
        }

        let x = self.features(waveforms)?;
        let (z1, a1) = self.hidden.forward_traced(&x);
        let probs: Vec<f32> = self
            .output
            .forward(&a1)
            .into_iter()
            .map(|row| row[0])
            .collect();
        let report = self.report(labels, &probs)?;

        // Fused sigmoid + cross-entropy gradient at the output unit.
        let batch = waveforms.len() as f32;
        let dz2: Vec<f32> = probs
            .iter()
            .zip(labels.iter())
            .map(|(&p, &y)| (p - y) / batch)
            .collect();

        let h = self.hidden.units();
        let d = self.embedding_dim;
        let w2 = self.output.weights().to_vec();

        let mut dw2 = vec![0.0f32; h];
        let mut db2 = 0.0f32;
        for (bi, &dz) in dz2.iter().enumerate() {
            db2 += dz;
            for u in 0..h {
                dw2[u] += dz * a1[bi][u];
            }
        }

        let mut dw1 = vec![0.0f32; h * d];
        let mut db1 = vec![0.0f32; h];
        for (bi, &dz) in dz2.iter().enumerate() {
            for u in 0..h {
                // ReLU gate: closed units pass no gradient.
                if z1[bi][u] > 0.0 {
                    let dz1 = dz * w2[u];
                    db1[u] += dz1;
                    let row = &mut dw1[u * d..(u + 1) * d];
                    for (slot, &xi) in row.iter_mut().zip(x[bi].iter()) {
                        *slot += dz1 * xi;
                    }
                }
            }
        }

        self.optimizer.next_step();
        let (w, b) = self.hidden.params_mut();
        self.optimizer.update(self.slot_hidden_w, w, &dw1);
        self.optimizer.update(self.slot_hidden_b, b, &db1);
        let (w, b) = self.output.params_mut();
        self.optimizer.update(self.slot_output_w, w, &dw2);
        self.optimizer.update(self.slot_output_b, b, &[db2]);

        Ok(report)
    }

    /// Loss and metrics on a labeled batch, without updating weights.
    pub fn evaluate(
        &self,
        waveforms: &[Vec<f32>],
        labels: &[f32],
    ) -> Result<BatchReport, TrillheadError> {
        if waveforms.is_empty() {
            return Err(TrillheadError::EmptyBatch);
        }
        if labels.len() != waveforms.len() {
            return Err(TrillheadError::ShapeMismatch {
                expected: waveforms.len(),
                got: labels.len(),
            });
        }
        let probs = self.predict(waveforms)?;
        self.report(labels, &probs)
    }

    /// Runs the frozen extractor and flattens each clip's embedding into
    /// one feature row, verifying the batch stays rectangular.
    fn features(&self, waveforms: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, TrillheadError> {
        let rows = self.extractor.extract(waveforms, EMBEDDING_OUTPUT)?;
        if rows.len() != waveforms.len() {
            return Err(TrillheadError::ShapeMismatch {
                expected: waveforms.len(),
                got: rows.len(),
            });
        }
        for row in &rows {
            if row.len() != self.embedding_dim {
                return Err(TrillheadError::ShapeMismatch {
                    expected: self.embedding_dim,
                    got: row.len(),
                });
            }
        }
        Ok(rows)
    }

    fn report(&self, labels: &[f32], probs: &[f32]) -> Result<BatchReport, TrillheadError> {
        let loss = binary_cross_entropy(labels, probs)?;
        let mut values = Vec::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            values.push((metric.name.to_string(), (metric.eval)(labels, probs)?));
        }
        Ok(BatchReport { loss, metrics: values })
    }
}
