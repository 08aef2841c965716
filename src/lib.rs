//! Acquisition, live metrics and CSV export for the BrainLink Lite EEG headset.
//!
//! Bytes arrive over a serial port, a vendor parser turns them into
//! [`band::BandSample`]s, and a [`recorder::Recorder`] collects them into a
//! [`session::SharedSession`] that the display and exporter read.
pub mod band;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod export;
pub mod gui;
pub mod metrics;
pub mod recorder;
pub mod session;
pub mod sink;
pub mod transport;
pub mod types;

pub use error::{RecorderError, Result};
