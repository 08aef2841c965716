// src/decoder/simulated.rs
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::band::{BandName, BandSample};
use crate::error::Result;
use crate::recorder::SampleSource;
use crate::sink::DecoderCallbacks;

/// The headset reports one band sample per second.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Stand-in for a headset: emits plausible band samples on a fixed cadence.
pub struct SimulatedHeadset {
    rng: StdRng,
    sample_interval: Duration,
    poll_interval: Duration,
    next_due: Instant,
    attention: f64,
    meditation: f64,
}

impl SimulatedHeadset {
    pub fn new(poll_interval: Duration) -> Self {
        Self::with_rng(StdRng::from_entropy(), DEFAULT_SAMPLE_INTERVAL, poll_interval)
    }

    pub fn with_rng(rng: StdRng, sample_interval: Duration, poll_interval: Duration) -> Self {
        Self {
            rng,
            sample_interval,
            poll_interval,
            next_due: Instant::now() + sample_interval,
            attention: 50.0,
            meditation: 50.0,
        }
    }

    /// Deterministic headset for tests.
    pub fn seeded(seed: u64, sample_interval: Duration, poll_interval: Duration) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), sample_interval, poll_interval)
    }

    // eSense indices wander, clamped to the 0..=100 range the firmware uses
    fn drift(rng: &mut StdRng, value: f64) -> f64 {
        (value + rng.gen_range(-8.0..=8.0)).clamp(0.0, 100.0).round()
    }

    pub fn next_sample(&mut self) -> BandSample {
        self.attention = Self::drift(&mut self.rng, self.attention);
        self.meditation = Self::drift(&mut self.rng, self.meditation);
        let mut sample = BandSample::default()
            .with(BandName::Attention, self.attention)
            .with(BandName::Meditation, self.meditation);
        let ranges: [(BandName, f64, f64); 8] = [
            (BandName::Delta, 50_000.0, 800_000.0),
            (BandName::Theta, 10_000.0, 200_000.0),
            (BandName::LowAlpha, 2_000.0, 60_000.0),
            (BandName::HighAlpha, 2_000.0, 50_000.0),
            (BandName::LowBeta, 1_500.0, 40_000.0),
            (BandName::HighBeta, 1_500.0, 45_000.0),
            (BandName::LowGamma, 500.0, 20_000.0),
            (BandName::HighGamma, 300.0, 15_000.0),
        ];
        for (band, lo, hi) in ranges {
            sample.set(band, self.rng.gen_range(lo..hi).round());
        }
        sample
    }
}

impl SampleSource for SimulatedHeadset {
    fn pump(&mut self, callbacks: &mut dyn DecoderCallbacks) -> Result<()> {
        let now = Instant::now();
        if now < self.next_due {
            thread::sleep((self.next_due - now).min(self.poll_interval));
            return Ok(());
        }
        self.next_due += self.sample_interval;
        callbacks.on_band_sample(self.next_sample());
        Ok(())
    }
}
