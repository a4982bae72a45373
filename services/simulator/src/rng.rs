//! Seedable random source for the simulator
//!
//! A PCG32 generator behind the sampling operations the flow model needs.
//! Everything is deterministic under a fixed seed/stream pair, which the
//! statistical tests rely on.

use rand::distributions::Open01;
use rand::Rng;
use rand_distr::{Distribution, Exp, LogNormal, Normal, Poisson};
use rand_pcg::Pcg32;

/// PCG32-backed sampler.
pub struct SimRng {
    inner: Pcg32,
}

impl SimRng {
    /// Create from a seed and stream selector.
    #[must_use]
    pub fn new(seed: u64, stream: u64) -> Self {
        Self {
            inner: Pcg32::new(seed, stream),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn standard_uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform draw in the open interval `(0, 1)`; safe to take `ln` of.
    pub fn open_uniform(&mut self) -> f64 {
        self.inner.sample(Open01)
    }

    /// Standard normal draw.
    pub fn standard_normal(&mut self) -> f64 {
        match Normal::new(0.0, 1.0) {
            Ok(dist) => dist.sample(&mut self.inner),
            Err(_) => 0.0,
        }
    }

    /// Exponential draw with the given rate (mean `1/rate`). Zero when the
    /// rate is not positive.
    pub fn exponential(&mut self, rate: f64) -> f64 {
        match Exp::new(rate) {
            Ok(dist) => dist.sample(&mut self.inner),
            Err(_) => 0.0,
        }
    }

    /// Poisson draw. Zero when the mean is not positive.
    pub fn poisson(&mut self, mean: f64) -> u32 {
        match Poisson::new(mean) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Ok(dist) => dist.sample(&mut self.inner) as u32,
            Err(_) => 0,
        }
    }

    /// Biased coin flip; `p` is clamped into `[0, 1]`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.inner.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform integer in `[low, high]`.
    pub fn uniform_int(&mut self, low: u32, high: u32) -> u32 {
        self.inner.gen_range(low..=high)
    }

    /// Lognormal draw with location `mu` and scale `sigma` (of the log).
    pub fn lognormal(&mut self, mu: f64, sigma: f64) -> f64 {
        match LogNormal::new(mu, sigma) {
            Ok(dist) => dist.sample(&mut self.inner),
            Err(_) => mu.exp(),
        }
    }

    /// Sample an index from cumulative probabilities (last entry ≈ 1).
    ///
    /// Linear scan; category counts here are single digits.
    pub fn categorical(&mut self, cumulative: &[f64]) -> usize {
        debug_assert!(cumulative.last().is_some_and(|&last| last > 0.999_999));
        let u = self.standard_uniform();
        for (index, &bound) in cumulative.iter().enumerate() {
            if u < bound {
                return index;
            }
        }
        cumulative.len().saturating_sub(1)
    }

    /// Round `x` to an integer, going up with probability equal to the
    /// fractional part.
    #[allow(clippy::cast_possible_truncation)]
    pub fn round_stochastic(&mut self, x: f64) -> i64 {
        let floor = x.floor();
        let frac = x - floor;
        let base = floor as i64;
        if self.bernoulli(frac) {
            base + 1
        } else {
            base
        }
    }
}
