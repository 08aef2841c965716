// src/session.rs
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::band::{BandName, BandSample};
use crate::metrics::alpha_beta_ratio_from_sample;

/// Default number of points kept for the live plots.
pub const DEFAULT_PLOT_LEN: usize = 200;

/// Full per-band history of a session, one column per band.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleHistory {
    columns: [Vec<f64>; BandName::COUNT],
}

impl SampleHistory {
    /// Builds a history from arbitrary columns; lengths may differ.
    pub fn from_columns(columns: [Vec<f64>; BandName::COUNT]) -> Self {
        Self { columns }
    }

    pub fn push(&mut self, sample: &BandSample) {
        for (column, value) in self.columns.iter_mut().zip(sample.values()) {
            column.push(*value);
        }
    }

    pub fn band(&self, band: BandName) -> &[f64] {
        &self.columns[band.index()]
    }

    /// Length of the longest column.
    pub fn max_len(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.max_len() == 0
    }

    /// Row `index` across all bands; `None` where a column is too short.
    pub fn row(&self, index: usize) -> [Option<f64>; BandName::COUNT] {
        let mut row = [None; BandName::COUNT];
        for (cell, column) in row.iter_mut().zip(&self.columns) {
            *cell = column.get(index).copied();
        }
        row
    }

    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
    }
}

/// Fixed-size FIFO: once full, every push evicts the oldest value.
#[derive(Clone, Debug)]
struct Ring {
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, val: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(val);
    }
}

/// Ratio, attention and elapsed-time buffers behind the two live plots.
#[derive(Clone, Debug)]
pub struct RollingWindow {
    ratio: Ring,
    attention: Ring,
    time: Ring,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            ratio: Ring::new(capacity),
            attention: Ring::new(capacity),
            time: Ring::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.time.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.buffer.is_empty()
    }

    pub fn push(&mut self, elapsed_secs: f64, ratio: f64, attention: f64) {
        self.time.push(elapsed_secs);
        self.ratio.push(ratio);
        self.attention.push(attention);
    }

    // x axis starts at the oldest retained point
    fn points(&self, ys: &Ring) -> Vec<[f64; 2]> {
        let start = self.time.buffer.front().copied().unwrap_or(0.0);
        self.time
            .buffer
            .iter()
            .zip(&ys.buffer)
            .map(|(t, y)| [t - start, *y])
            .collect()
    }

    pub fn ratio_points(&self) -> Vec<[f64; 2]> {
        self.points(&self.ratio)
    }

    pub fn attention_points(&self) -> Vec<[f64; 2]> {
        self.points(&self.attention)
    }

    pub fn clear(&mut self) {
        self.ratio.buffer.clear();
        self.attention.buffer.clear();
        self.time.buffer.clear();
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_PLOT_LEN)
    }
}

/// Everything one acquisition session accumulates.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    history: SampleHistory,
    window: RollingWindow,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl SessionState {
    pub fn with_plot_len(plot_len: usize) -> Self {
        Self {
            history: SampleHistory::default(),
            window: RollingWindow::new(plot_len),
            started_at: None,
            stopped_at: None,
        }
    }

    /// Clears previous data and starts the elapsed-time clock.
    pub fn begin(&mut self) {
        self.history.clear();
        self.window.clear();
        self.started_at = Some(Instant::now());
        self.stopped_at = None;
    }

    /// Freezes the elapsed-time clock at the moment acquisition stopped.
    pub fn finish(&mut self) {
        if self.started_at.is_some() && self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
    }

    pub fn record(&mut self, sample: &BandSample) {
        self.history.push(sample);
        let elapsed = self.elapsed().as_secs_f64();
        self.window.push(
            elapsed,
            alpha_beta_ratio_from_sample(sample),
            sample.get(BandName::Attention),
        );
    }

    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }
}

/// Session state shared between the acquisition thread and its readers.
#[derive(Clone, Debug, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedSession {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Locks the session. A writer that panicked mid-append leaves the data
    /// usable, so a poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn history_snapshot(&self) -> SampleHistory {
        self.lock().history().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_columns_grow_in_lock_step() {
        let mut h = SampleHistory::default();
        h.push(&BandSample::default());
        h.push(&BandSample::default().with(BandName::Delta, 5.0));
        for band in BandName::ALL {
            assert_eq!(h.band(band).len(), 2);
        }
        assert_eq!(h.band(BandName::Delta), &[0.0, 5.0]);
        h.clear();
        assert!(h.is_empty());
    }

    #[test]
    fn ragged_history_reports_blank_cells() {
        let mut cols: [Vec<f64>; BandName::COUNT] = Default::default();
        cols[BandName::Attention.index()] = vec![1.0, 2.0, 3.0];
        cols[BandName::Theta.index()] = vec![9.0];
        let h = SampleHistory::from_columns(cols);
        assert_eq!(h.max_len(), 3);
        let row = h.row(2);
        assert_eq!(row[BandName::Attention.index()], Some(3.0));
        assert_eq!(row[BandName::Theta.index()], None);
    }

    #[test]
    fn rolling_window_discards_oldest() {
        let mut w = RollingWindow::new(3);
        for i in 0..5 {
            w.push(i as f64, i as f64 * 10.0, 50.0);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(
            w.ratio_points(),
            vec![[0.0, 20.0], [1.0, 30.0], [2.0, 40.0]]
        );
        assert_eq!(w.attention_points().len(), 3);
    }

    #[test]
    fn zero_capacity_window_stays_empty() {
        let mut w = RollingWindow::new(0);
        w.push(0.0, 1.0, 1.0);
        assert!(w.is_empty());
    }

    #[test]
    fn begin_clears_previous_session() {
        let mut state = SessionState::with_plot_len(10);
        state.begin();
        state.record(&BandSample::default().with(BandName::LowBeta, 1.0));
        assert_eq!(state.history().max_len(), 1);
        assert_eq!(state.window().len(), 1);
        state.begin();
        assert!(state.history().is_empty());
        assert!(state.window().is_empty());
    }

    #[test]
    fn elapsed_stops_growing_after_finish() {
        let mut state = SessionState::with_plot_len(4);
        assert_eq!(state.elapsed(), Duration::ZERO);
        state.begin();
        std::thread::sleep(Duration::from_millis(20));
        state.finish();
        let frozen = state.elapsed();
        assert!(frozen >= Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(state.elapsed(), frozen);

        // a new session restarts the clock
        state.begin();
        assert!(state.elapsed() < frozen);
    }

    #[test]
    fn shared_session_survives_poisoning() {
        let shared = SharedSession::new(SessionState::with_plot_len(4));
        let clone = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock();
            panic!("writer died");
        })
        .join();
        shared.lock().record(&BandSample::default());
        assert_eq!(shared.history_snapshot().max_len(), 1);
    }
}
