// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

use crate::band::BandName;

/// One failed candidate during port discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortAttempt {
    pub port: String,
    pub reason: String,
}

fn describe_attempts(attempts: &[PortAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.port, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("no candidate port could be opened ({})", describe_attempts(.attempts))]
    NoPortAvailable { attempts: Vec<PortAttempt> },
    #[error("failed to open {port}: {reason}")]
    PortOpen { port: String, reason: String },
    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("could not start acquisition thread: {0}")]
    Thread(#[source] std::io::Error),
    #[error("decoder library {path:?} unavailable: {reason}")]
    DecoderLibrary { path: PathBuf, reason: String },
    #[error("decoder rejected input (code {0})")]
    Decoder(i32),
    #[error("a recording session is already running")]
    AlreadyRecording,
    #[error("no recording session is running")]
    NotRecording,
    #[error("failed to export session: {0}")]
    Export(#[from] ExportError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Why a decoded sample was not recorded.
#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("band {band} carried a non-finite value ({value})")]
    NonFinite { band: BandName, value: f64 },
}

pub type Result<T, E = RecorderError> = std::result::Result<T, E>;
