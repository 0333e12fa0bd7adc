//! Injectable load-reading strategies for the aggregation tick.
//!
//! The aggregator sums registry draw itself; a [`LoadModel`] then maps
//! that figure into the reading actually sampled. This keeps the sampling
//! behavior a strategy rather than hardwired randomness: demos inject
//! seeded jitter, meters inject real readings, tests inject passthrough.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Strategy mapping summed registry load into one sampled reading.
pub trait LoadModel {
    /// Returns the load reading for one tick, in kilowatts, non-negative.
    ///
    /// # Arguments
    ///
    /// * `registry_kw` - Total draw of all on-devices, already in kW
    fn sample_kw(&mut self, registry_kw: f32) -> f32;
}

/// Deterministic model: the sampled reading is the registry load itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl LoadModel for Passthrough {
    fn sample_kw(&mut self, registry_kw: f32) -> f32 {
        registry_kw.max(0.0)
    }
}

/// Seeded stochastic model for demo runs.
///
/// Perturbs the registry load with Gaussian noise from a seeded RNG, so
/// identical seeds reproduce identical series.
#[derive(Debug, Clone)]
pub struct SeededJitter {
    noise_std_kw: f32,
    rng: StdRng,
}

impl SeededJitter {
    /// Creates a jitter model with the given noise level and seed.
    pub fn new(noise_std_kw: f32, seed: u64) -> Self {
        Self {
            noise_std_kw,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl LoadModel for SeededJitter {
    fn sample_kw(&mut self, registry_kw: f32) -> f32 {
        let noise = gaussian_noise(&mut self.rng, self.noise_std_kw);
        (registry_kw + noise).max(0.0)
    }
}

/// External meter readings, oldest first, with registry fallback.
///
/// Each tick consumes one queued reading; when the queue is empty the
/// model falls back to the registry load.
///
/// # Examples
///
/// ```
/// use homewatt::aggregate::{LoadModel, MeterFeed};
///
/// let mut feed = MeterFeed::new();
/// feed.push_reading(2.5);
/// assert_eq!(feed.sample_kw(1.0), 2.5);
/// assert_eq!(feed.sample_kw(1.0), 1.0); // queue drained, fallback
/// ```
#[derive(Debug, Default, Clone)]
pub struct MeterFeed {
    pending: VecDeque<f32>,
}

impl MeterFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a feed pre-loaded with readings, consumed oldest first.
    pub fn from_readings(readings: impl IntoIterator<Item = f32>) -> Self {
        Self {
            pending: readings.into_iter().collect(),
        }
    }

    /// Queues one external reading in kilowatts.
    pub fn push_reading(&mut self, kw: f32) {
        self.pending.push_back(kw);
    }

    /// Number of readings waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl LoadModel for MeterFeed {
    fn sample_kw(&mut self, registry_kw: f32) -> f32 {
        self.pending.pop_front().unwrap_or(registry_kw).max(0.0)
    }
}

/// Gaussian noise via the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f32) -> f32 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f32 = rng.random::<f32>().clamp(1e-6, 1.0);
    let u2: f32 = rng.random::<f32>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
    z0 * std_dev
}
