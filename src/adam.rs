//! Adam optimizer for the trainable head parameters.
//!
//! Parameter tensors register once as slots, each holding its own first and
//! second moment estimates. All slots share one step counter, advanced once
//! per batch, so bias correction sees the same timestep for every tensor in
//! the model.

use crate::metrics::EPSILON;

/// Adam hyperparameters.
///
/// Defaults are the conventional `lr = 0.001`, `beta1 = 0.9`,
/// `beta2 = 0.999`, with [`EPSILON`] as the update fuzz term.
#[derive(Debug, Clone)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: EPSILON,
        }
    }
}

#[derive(Debug)]
struct Slot {
    m: Vec<f32>,
    v: Vec<f32>,
}

/// Adam state over a set of registered parameter tensors.
#[derive(Debug)]
pub struct Adam {
    cfg: AdamConfig,
    step: u64,
    slots: Vec<Slot>,
}

impl Adam {
    pub fn new(cfg: AdamConfig) -> Self {
        assert!(
            cfg.learning_rate > 0.0,
            "trillhead: AdamConfig.learning_rate must be positive"
        );
        Self {
            cfg,
            step: 0,
            slots: Vec::new(),
        }
    }

    /// Registers a parameter tensor of `len` values and returns its slot
    /// index. Moments start at zero.
    pub fn add_slot(&mut self, len: usize) -> usize {
        self.slots.push(Slot {
            m: vec![0.0; len],
            v: vec![0.0; len],
        });
        self.slots.len() - 1
    }

    /// Advances the shared step counter. Call once per batch, before the
    /// per-tensor [`update`](Self::update) calls for that batch.
    pub fn next_step(&mut self) {
        self.step += 1;
    }

    /// Number of completed optimizer steps.
    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn config(&self) -> &AdamConfig {
        &self.cfg
    }

    /// Applies one bias-corrected Adam update to `param` in place.
    pub fn update(&mut self, slot: usize, param: &mut [f32], grad: &[f32]) {
        assert!(
            self.step > 0,
            "trillhead: Adam::next_step must be called before update"
        );
        let state = &mut self.slots[slot];
        assert!(
            param.len() == state.m.len() && grad.len() == state.m.len(),
            "trillhead: Adam slot length {} does not match param {} / grad {}",
            state.m.len(),
            param.len(),
            grad.len()
        );
        let t = self.step as f64;
        let bc1 = 1.0 - (self.cfg.beta1 as f64).powf(t);
        let bc2 = 1.0 - (self.cfg.beta2 as f64).powf(t);
        let lr_t = (self.cfg.learning_rate as f64 * bc2.sqrt() / bc1) as f32;
        for i in 0..param.len() {
            let g = grad[i];
            state.m[i] = self.cfg.beta1 * state.m[i] + (1.0 - self.cfg.beta1) * g;
            state.v[i] = self.cfg.beta2 * state.v[i] + (1.0 - self.cfg.beta2) * g * g;
            param[i] -= lr_t * state.m[i] / (state.v[i].sqrt() + self.cfg.epsilon);
        }
    }
}
