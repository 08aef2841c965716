// src/sink.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::band::{BandSample, ExtendedBands, Orientation, PulseIntervals};
use crate::error::SampleError;
use crate::session::SharedSession;

/// Callbacks a decoder invokes as frames complete.
///
/// Only band samples are recorded; the rest default to no-ops.
pub trait DecoderCallbacks {
    fn on_band_sample(&mut self, sample: BandSample);

    fn on_extended_bands(&mut self, _bands: ExtendedBands) {}

    fn on_orientation(&mut self, _orientation: Orientation) {}

    fn on_pulse(&mut self, _pulse: PulseIntervals) {}

    fn on_raw(&mut self, _raw: i16) {}
}

/// Accepted/dropped sample counters, readable from any thread.
#[derive(Debug, Default)]
pub struct SinkStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl SinkStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Appends decoded samples to the session history and rolling window.
#[derive(Clone)]
pub struct SessionSink {
    session: SharedSession,
    stats: Arc<SinkStats>,
}

impl SessionSink {
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            stats: Arc::new(SinkStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SinkStats> {
        Arc::clone(&self.stats)
    }

    /// Records one sample, rejecting it if any band is not a finite number.
    pub fn accept(&self, sample: &BandSample) -> Result<(), SampleError> {
        if let Some(band) = sample.first_non_finite() {
            return Err(SampleError::NonFinite {
                band,
                value: sample.get(band),
            });
        }
        self.session.lock().record(sample);
        Ok(())
    }
}

impl DecoderCallbacks for SessionSink {
    fn on_band_sample(&mut self, sample: BandSample) {
        match self.accept(&sample) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("dropping band sample: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::BandName;
    use crate::session::SessionState;

    #[test]
    fn valid_samples_are_recorded() {
        let session = SharedSession::new(SessionState::with_plot_len(8));
        let mut sink = SessionSink::new(session.clone());
        sink.on_band_sample(BandSample::default().with(BandName::Attention, 42.0));
        sink.on_extended_bands(ExtendedBands::default());
        sink.on_raw(12);
        assert_eq!(session.history_snapshot().band(BandName::Attention), &[42.0]);
        assert_eq!(sink.stats().accepted(), 1);
        assert_eq!(sink.stats().dropped(), 0);
    }

    #[test]
    fn non_finite_sample_is_dropped_without_touching_history() {
        let session = SharedSession::new(SessionState::with_plot_len(8));
        let mut sink = SessionSink::new(session.clone());
        sink.on_band_sample(BandSample::default().with(BandName::HighGamma, f64::INFINITY));
        assert!(session.history_snapshot().is_empty());
        assert!(session.lock().window().is_empty());
        assert_eq!(sink.stats().dropped(), 1);
    }
}
