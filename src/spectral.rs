//! Builtin embedding extractor based on framed spectral statistics.
//!
//! The extractor is pure DSP, no pretrained weights: waveforms are cut into
//! overlapping frames, each frame is Hann-windowed and measured at a set of
//! mel-spaced band centers (Goertzel filters), and the per-frame log
//! energies are pooled over time into a mean and standard deviation per
//! band. The pooled vector is the `"embedding"` output.
//!
//! It exists so a conforming extractor is always available without network
//! access or an inference runtime: wiring tests, smoke-testing classifier
//! assembly, and modest baselines all run against it. An optional linear
//! projection loaded from JSON maps the statistics into a learned space.

use serde::Deserialize;

use crate::error::TrillheadError;
use crate::extractor::{EMBEDDING_OUTPUT, EmbeddingExtractor};

/// Per-band mean log power, exposed as a secondary named output.
pub const BAND_ENERGY_OUTPUT: &str = "band_energy";

/// Framing and band layout for [`SpectralStatsExtractor`].
///
/// Defaults target 16 kHz speech: 25 ms frames with a 10 ms shift and 40
/// mel-spaced bands between 50 Hz and 7600 Hz.
#[derive(Debug, Clone)]
pub struct SpectralConfig {
    pub sample_rate: usize,
    pub frame_length: usize,
    pub frame_shift: usize,
    /// Number of mel-spaced analysis bands.
    pub bands: usize,
    pub low_freq: f64,
    pub high_freq: f64,
    /// Floor applied to powers before the log.
    pub energy_floor: f64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_length: 400,
            frame_shift: 160,
            bands: 40,
            low_freq: 50.0,
            high_freq: 7600.0,
            energy_floor: 1e-10,
        }
    }
}

/// Embedding width for a config: mean and std of frame energy plus each
/// band, before any projection.
fn stats_dim(cfg: &SpectralConfig) -> usize {
    2 * (cfg.bands + 1)
}

fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// On-disk format for a pretrained projection: `out_dim` rows of `in_dim`
/// weights, applied to the raw statistics vector.
#[derive(Debug, Deserialize)]
struct ProjectionFile {
    in_dim: usize,
    out_dim: usize,
    weights: Vec<Vec<f32>>,
}

#[derive(Debug)]
struct Projection {
    out_dim: usize,
    weights: Vec<Vec<f32>>,
}

impl Projection {
    fn apply(&self, stats: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|row| row.iter().zip(stats.iter()).map(|(w, x)| w * x).sum())
            .collect()
    }
}

/// Mel-band spectral statistics extractor. See the module docs for the
/// pipeline; construct via [`new`](Self::new) or, with a pretrained
/// projection, [`with_projection_json`](Self::with_projection_json).
#[derive(Debug)]
pub struct SpectralStatsExtractor {
    cfg: SpectralConfig,
    /// Band center frequencies in Hz, mel-spaced across the config range.
    centers: Vec<f64>,
    window: Vec<f64>,
    projection: Option<Projection>,
}

impl SpectralStatsExtractor {
    pub fn new(cfg: SpectralConfig) -> Self {
        assert!(cfg.sample_rate > 0, "trillhead: SpectralConfig.sample_rate must be positive");
        assert!(cfg.frame_length > 1, "trillhead: SpectralConfig.frame_length must exceed 1");
        assert!(cfg.frame_shift > 0, "trillhead: SpectralConfig.frame_shift must be positive");
        assert!(cfg.bands > 0, "trillhead: SpectralConfig.bands must be positive");
        assert!(
            0.0 < cfg.low_freq && cfg.low_freq < cfg.high_freq,
            "trillhead: SpectralConfig band range is empty"
        );
        assert!(
            cfg.high_freq <= cfg.sample_rate as f64 / 2.0,
            "trillhead: SpectralConfig.high_freq exceeds Nyquist"
        );

        // Interior points of the mel range, one per band.
        let mel_low = hz_to_mel(cfg.low_freq);
        let mel_high = hz_to_mel(cfg.high_freq);
        let centers = (0..cfg.bands)
            .map(|k| {
                let mel = mel_low + (k + 1) as f64 * (mel_high - mel_low) / (cfg.bands + 1) as f64;
                mel_to_hz(mel)
            })
            .collect();

        let n = cfg.frame_length;
        let window = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64;
                0.5 - 0.5 * phase.cos()
            })
            .collect();

        Self {
            cfg,
            centers,
            window,
            projection: None,
        }
    }

    /// Builds an extractor whose `"embedding"` output is the statistics
    /// vector passed through a projection matrix parsed from `json`.
    ///
    /// The file's `in_dim` must match the config's statistics width;
    /// anything malformed is a [`TrillheadError::WeightFile`].
    pub fn with_projection_json(cfg: SpectralConfig, json: &[u8]) -> Result<Self, TrillheadError> {
        let file: ProjectionFile = serde_json::from_slice(json)
            .map_err(|e| TrillheadError::WeightFile(format!("bad projection JSON: {e}")))?;
        let expected = stats_dim(&cfg);
        if file.in_dim != expected {
            return Err(TrillheadError::WeightFile(format!(
                "projection in_dim {} does not match statistics width {expected}",
                file.in_dim
            )));
        }
        if file.out_dim == 0 || file.weights.len() != file.out_dim {
            return Err(TrillheadError::WeightFile(format!(
                "projection declares {} rows but carries {}",
                file.out_dim,
                file.weights.len()
            )));
        }
        if let Some(row) = file.weights.iter().find(|row| row.len() != file.in_dim) {
            return Err(TrillheadError::WeightFile(format!(
                "projection row has {} weights, expected {}",
                row.len(),
                file.in_dim
            )));
        }
        let mut extractor = Self::new(cfg);
        extractor.projection = Some(Projection {
            out_dim: file.out_dim,
            weights: file.weights,
        });
        Ok(extractor)
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.cfg
    }

    /// Log frame energy followed by log Goertzel power at each band center.
    fn frame_features(&self, frame: &[f32]) -> Vec<f64> {
        let n = self.cfg.frame_length;
        let mut features = Vec::with_capacity(self.cfg.bands + 1);

        let energy: f64 = frame.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / n as f64;
        features.push(energy.max(self.cfg.energy_floor).ln());

        let windowed: Vec<f64> = frame
            .iter()
            .zip(self.window.iter())
            .map(|(&x, &w)| x as f64 * w)
            .collect();
        let scale = (n as f64 / 2.0).powi(2);
        for &center in &self.centers {
            let w = 2.0 * std::f64::consts::PI * center / self.cfg.sample_rate as f64;
            let coeff = 2.0 * w.cos();
            let (mut s1, mut s2) = (0.0f64, 0.0f64);
            for &x in &windowed {
                let s0 = x + coeff * s1 - s2;
                s2 = s1;
                s1 = s0;
            }
            let power = (s1 * s1 + s2 * s2 - coeff * s1 * s2) / scale;
            features.push(power.max(self.cfg.energy_floor).ln());
        }
        features
    }

    /// Frames the waveform and pools per-frame features over time.
    /// Returns (means, stds), each `bands + 1` wide.
    fn analyze(&self, waveform: &[f32]) -> Result<(Vec<f64>, Vec<f64>), TrillheadError> {
        let n = self.cfg.frame_length;
        if waveform.len() < n {
            return Err(TrillheadError::AudioTooShort {
                min_samples: n,
                got_samples: waveform.len(),
            });
        }
        let num_frames = (waveform.len() - n) / self.cfg.frame_shift + 1;
        let width = self.cfg.bands + 1;

        let mut frames = Vec::with_capacity(num_frames);
        for f in 0..num_frames {
            let start = f * self.cfg.frame_shift;
            frames.push(self.frame_features(&waveform[start..start + n]));
        }

        let mut means = vec![0.0f64; width];
        for frame in &frames {
            for (m, &x) in means.iter_mut().zip(frame.iter()) {
                *m += x;
            }
        }
        for m in &mut means {
            *m /= num_frames as f64;
        }

        let mut stds = vec![0.0f64; width];
        for frame in &frames {
            for ((s, &x), &m) in stds.iter_mut().zip(frame.iter()).zip(means.iter()) {
                let d = x - m;
                *s += d * d;
            }
        }
        for s in &mut stds {
            *s = (*s / num_frames as f64).max(0.0).sqrt();
        }

        Ok((means, stds))
    }

    fn embedding_row(&self, waveform: &[f32]) -> Result<Vec<f32>, TrillheadError> {
        let (means, stds) = self.analyze(waveform)?;
        let stats: Vec<f32> = means
            .iter()
            .chain(stds.iter())
            .map(|&x| x as f32)
            .collect();
        Ok(match &self.projection {
            Some(p) => p.apply(&stats),
            None => stats,
        })
    }
}

impl EmbeddingExtractor for SpectralStatsExtractor {
    fn output_names(&self) -> Vec<String> {
        vec![EMBEDDING_OUTPUT.to_string(), BAND_ENERGY_OUTPUT.to_string()]
    }

    fn dimension(&self, output: &str) -> Option<usize> {
        match output {
            EMBEDDING_OUTPUT => Some(match &self.projection {
                Some(p) => p.out_dim,
                None => stats_dim(&self.cfg),
            }),
            BAND_ENERGY_OUTPUT => Some(self.cfg.bands + 1),
            _ => None,
        }
    }

    fn extract(
        &self,
        waveforms: &[Vec<f32>],
        output: &str,
    ) -> Result<Vec<Vec<f32>>, TrillheadError> {
        if self.dimension(output).is_none() {
            return Err(TrillheadError::MissingOutput(output.to_string()));
        }
        let mut rows = Vec::with_capacity(waveforms.len());
        for waveform in waveforms {
            if output == BAND_ENERGY_OUTPUT {
                let (means, _) = self.analyze(waveform)?;
                rows.push(means.iter().map(|&x| x as f32).collect());
            } else {
                rows.push(self.embedding_row(waveform)?);
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_hz: f64, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| {
                let t = i as f64 / 16000.0;
                (2.0 * std::f64::consts::PI * freq_hz * t).sin() as f32 * 0.5
            })
            .collect()
    }

    #[test]
    fn default_dimensions() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        assert_eq!(extractor.dimension(EMBEDDING_OUTPUT), Some(82));
        assert_eq!(extractor.dimension(BAND_ENERGY_OUTPUT), Some(41));
        assert_eq!(extractor.dimension("attention"), None);
        let names = extractor.output_names();
        assert!(names.iter().any(|n| n == EMBEDDING_OUTPUT));
        assert!(names.iter().any(|n| n == BAND_ENERGY_OUTPUT));
    }

    #[test]
    fn silence_embeds_finite_with_flat_time_profile() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        let rows = extractor.extract(&[vec![0.0; 16000]], EMBEDDING_OUTPUT).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 82);
        assert!(rows[0].iter().all(|v| v.is_finite()));
        // Identical frames: every std component collapses to zero.
        for &s in &rows[0][41..] {
            assert!(s.abs() < 1e-6, "std component {s} should be ~0 for silence");
        }
    }

    #[test]
    fn distinct_tones_embed_differently() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        let rows = extractor
            .extract(&[sine(440.0, 8000), sine(2000.0, 8000)], EMBEDDING_OUTPUT)
            .unwrap();
        let spread = rows[0]
            .iter()
            .zip(rows[1].iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(spread > 0.1, "tone embeddings too close: max diff {spread}");
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        let batch = vec![sine(700.0, 6400)];
        let a = extractor.extract(&batch, EMBEDDING_OUTPUT).unwrap();
        let b = extractor.extract(&batch, EMBEDDING_OUTPUT).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sub_frame_audio_is_rejected() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        let err = extractor.extract(&[vec![0.0; 100]], EMBEDDING_OUTPUT).unwrap_err();
        assert!(matches!(
            err,
            TrillheadError::AudioTooShort { min_samples: 400, got_samples: 100 }
        ));
    }

    #[test]
    fn unknown_output_is_rejected() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        let err = extractor.extract(&[sine(440.0, 800)], "logits").unwrap_err();
        assert!(matches!(err, TrillheadError::MissingOutput(name) if name == "logits"));
    }

    #[test]
    fn variable_length_batch_keeps_uniform_width() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        let rows = extractor
            .extract(&[sine(300.0, 8000), sine(300.0, 12000)], EMBEDDING_OUTPUT)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 82));
    }

    #[test]
    fn band_energy_output_width() {
        let extractor = SpectralStatsExtractor::new(SpectralConfig::default());
        let rows = extractor.extract(&[sine(440.0, 4000)], BAND_ENERGY_OUTPUT).unwrap();
        assert_eq!(rows[0].len(), 41);
    }

    fn small_cfg() -> SpectralConfig {
        SpectralConfig {
            bands: 3,
            ..SpectralConfig::default()
        }
    }

    #[test]
    fn projection_narrows_embedding() {
        // bands = 3 gives an 8-wide statistics vector.
        let json = serde_json::json!({
            "in_dim": 8,
            "out_dim": 2,
            "weights": [[0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                        [0.0, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]],
        })
        .to_string();
        let extractor =
            SpectralStatsExtractor::with_projection_json(small_cfg(), json.as_bytes()).unwrap();
        assert_eq!(extractor.dimension(EMBEDDING_OUTPUT), Some(2));
        // band_energy is untouched by the projection.
        assert_eq!(extractor.dimension(BAND_ENERGY_OUTPUT), Some(4));
        let rows = extractor.extract(&[sine(440.0, 4000)], EMBEDDING_OUTPUT).unwrap();
        assert_eq!(rows[0].len(), 2);
        assert!(rows[0].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn projection_with_wrong_input_width_is_rejected() {
        let json = serde_json::json!({
            "in_dim": 5,
            "out_dim": 1,
            "weights": [[1.0, 1.0, 1.0, 1.0, 1.0]],
        })
        .to_string();
        let err = SpectralStatsExtractor::with_projection_json(small_cfg(), json.as_bytes())
            .unwrap_err();
        assert!(matches!(err, TrillheadError::WeightFile(_)));
    }

    #[test]
    fn ragged_projection_rows_are_rejected() {
        let json = serde_json::json!({
            "in_dim": 8,
            "out_dim": 2,
            "weights": [[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], [1.0]],
        })
        .to_string();
        let err = SpectralStatsExtractor::with_projection_json(small_cfg(), json.as_bytes())
            .unwrap_err();
        assert!(matches!(err, TrillheadError::WeightFile(_)));
    }

    #[test]
    fn malformed_projection_json_is_rejected() {
        let err =
            SpectralStatsExtractor::with_projection_json(small_cfg(), b"not json").unwrap_err();
        assert!(matches!(err, TrillheadError::WeightFile(msg) if msg.contains("JSON")));
    }
}
