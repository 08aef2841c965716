// src/metrics.rs
//! Derived metrics over band powers.
//!
//! Three zero-denominator policies coexist on purpose and must not be merged:
//! the live display (means and per-sample) substitutes [`RATIO_EPSILON`] for
//! the denominator, the CSV export divides safely to exactly `0.0`, and the
//! headless summary also reports `0.0` when the mean beta power is zero.
use std::io::{self, Write};

use crate::band::{BandName, BandSample};
use crate::session::SampleHistory;

/// Stand-in denominator for the live ratio when beta power is exactly zero.
pub const RATIO_EPSILON: f64 = 1e-9;

pub fn safe_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn epsilon_ratio(alpha: f64, beta: f64) -> f64 {
    let denom = if beta != 0.0 { beta } else { RATIO_EPSILON };
    alpha / denom
}

/// (mean lowAlpha + mean highAlpha) / (mean lowBeta + mean highBeta).
pub fn alpha_beta_ratio_from_means(history: &SampleHistory) -> f64 {
    let alpha = safe_mean(history.band(BandName::LowAlpha))
        + safe_mean(history.band(BandName::HighAlpha));
    let beta = safe_mean(history.band(BandName::LowBeta))
        + safe_mean(history.band(BandName::HighBeta));
    epsilon_ratio(alpha, beta)
}

/// Instantaneous ratio of one sample, fed to the rolling plot.
pub fn alpha_beta_ratio_from_sample(sample: &BandSample) -> f64 {
    let alpha = sample.get(BandName::LowAlpha) + sample.get(BandName::HighAlpha);
    let beta = sample.get(BandName::LowBeta) + sample.get(BandName::HighBeta);
    epsilon_ratio(alpha, beta)
}

/// Ratio printed at the end of a headless recording.
pub fn summary_ratio_from_means(history: &SampleHistory) -> f64 {
    let alpha = safe_mean(history.band(BandName::LowAlpha))
        + safe_mean(history.band(BandName::HighAlpha));
    let beta = safe_mean(history.band(BandName::LowBeta))
        + safe_mean(history.band(BandName::HighBeta));
    safe_divide(alpha, beta)
}

/// Writes the end-of-run report: one line per band (`No data` when the band
/// never received a value) followed by the summary ratio.
pub fn write_summary<W: Write>(
    history: &SampleHistory,
    elapsed_secs: u64,
    mut out: W,
) -> io::Result<()> {
    writeln!(out, "Average EEG values after {elapsed_secs} seconds of runtime")?;
    for band in BandName::ALL {
        let values = history.band(band);
        if values.is_empty() {
            writeln!(out, "{band}: No data")?;
        } else {
            writeln!(out, "{band}: {:.2}", safe_mean(values))?;
        }
    }
    writeln!(out, "Ratio of Alpha/Beta: {:.2}", summary_ratio_from_means(history))
}

/// Alpha/Beta and Theta/Beta for one export row. Blank cells count as zero.
pub fn export_ratios(row: &[Option<f64>; BandName::COUNT]) -> (f64, f64) {
    let cell = |band: BandName| row[band.index()].unwrap_or(0.0);
    let alpha = cell(BandName::LowAlpha) + cell(BandName::HighAlpha);
    let beta = cell(BandName::LowBeta) + cell(BandName::HighBeta);
    let theta = cell(BandName::Theta);
    (safe_divide(alpha, beta), safe_divide(theta, beta))
}

/// Snapshot shown in the "Live averages" panel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandAverages {
    pub means: [f64; BandName::COUNT],
    pub alpha_beta_ratio: f64,
    pub samples: usize,
}

impl BandAverages {
    pub fn from_history(history: &SampleHistory) -> Self {
        let mut means = [0.0; BandName::COUNT];
        for band in BandName::ALL {
            means[band.index()] = safe_mean(history.band(band));
        }
        Self {
            means,
            alpha_beta_ratio: alpha_beta_ratio_from_means(history),
            samples: history.max_len(),
        }
    }

    pub fn mean(&self, band: BandName) -> f64 {
        self.means[band.index()]
    }
}
