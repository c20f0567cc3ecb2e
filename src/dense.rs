//! Fully connected layers for the classification head.

/// Elementwise nonlinearity applied after the affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    /// Applies the nonlinearity to a single pre-activation value.
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// A dense layer: `activation(W x + b)` over rows of a batch.
///
/// Weights are stored row-major, one row of `in_dim` values per unit, and
/// initialized Glorot-uniform from a seeded PRNG so two layers built with
/// the same shape and seed are identical. Biases start at zero.
#[derive(Debug)]
pub struct Dense {
    in_dim: usize,
    units: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
    activation: Activation,
}

impl Dense {
    /// Creates a layer with Glorot-uniform weights drawn from `seed`.
    pub fn new(in_dim: usize, units: usize, activation: Activation, seed: u64) -> Self {
        assert!(in_dim > 0, "trillhead: Dense in_dim must be positive");
        assert!(units > 0, "trillhead: Dense units must be positive");
        let limit = (6.0 / (in_dim + units) as f64).sqrt();
        let mut rng = Xoshiro256ss::new(seed);
        let weights = (0..in_dim * units)
            .map(|_| ((rng.float64() * 2.0 - 1.0) * limit) as f32)
            .collect();
        Self {
            in_dim,
            units,
            weights,
            bias: vec![0.0; units],
            activation,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub(crate) fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub(crate) fn params_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.weights, &mut self.bias)
    }

    /// Applies the layer to a batch, one input row per example.
    pub fn forward(&self, input: &[Vec<f32>]) -> Vec<Vec<f32>> {
        self.forward_traced(input).1
    }

    /// Like [`forward`](Self::forward), but also returns the pre-activation
    /// values needed for backpropagation.
    pub(crate) fn forward_traced(&self, input: &[Vec<f32>]) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        let mut pre = Vec::with_capacity(input.len());
        let mut post = Vec::with_capacity(input.len());
        for row in input {
            assert!(
                row.len() == self.in_dim,
                "trillhead: Dense input width {} does not match in_dim {}",
                row.len(),
                self.in_dim
            );
            let mut z = Vec::with_capacity(self.units);
            for u in 0..self.units {
                let w = &self.weights[u * self.in_dim..(u + 1) * self.in_dim];
                let dot: f32 = w.iter().zip(row.iter()).map(|(a, b)| a * b).sum();
                z.push(dot + self.bias[u]);
            }
            let a = z.iter().map(|&v| self.activation.apply(v)).collect();
            pre.push(z);
            post.push(a);
        }
        (pre, post)
    }
}

// ---------------------------------------------------------------------------
// Xoshiro256** PRNG
//
// Seeded through SplitMix64 so a single u64 expands to a full 256-bit state.
// Only the uniform variate is needed for Glorot initialization.
// ---------------------------------------------------------------------------

struct Xoshiro256ss {
    s: [u64; 4],
}

impl Xoshiro256ss {
    fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut next = || {
            sm = sm.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = sm;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^ (z >> 31)
        };
        Self {
            s: [next(), next(), next(), next()],
        }
    }

    fn next_u64(&mut self) -> u64 {
        let result = self.s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform in [0, 1) with 53 bits of precision.
    fn float64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}
