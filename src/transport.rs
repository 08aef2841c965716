// src/transport.rs
use std::io::Read;
use std::time::Duration;

use crate::error::{PortAttempt, RecorderError, Result};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bounds how long a blocked read can delay a stop request.
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

pub fn default_ports() -> Vec<String> {
    vec!["COM4".to_owned(), "COM3".to_owned()]
}

/// Anything the acquisition thread can pull bytes from.
pub trait ByteStream: Read + Send {}

impl<T: Read + Send> ByteStream for T {}

/// Opens a named port. Split out so discovery can run against fakes.
pub trait PortOpener: Send {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn ByteStream>>;
}

/// Real serial ports through the `serialport` crate.
#[derive(Clone, Copy, Debug)]
pub struct SerialOpener {
    pub read_timeout: Duration,
}

impl Default for SerialOpener {
    fn default() -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
        }
    }
}

impl PortOpener for SerialOpener {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn ByteStream>> {
        let handle = serialport::new(port, baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| RecorderError::PortOpen {
                port: port.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(handle))
    }
}

/// An opened candidate port.
pub struct Connection {
    pub port: String,
    pub stream: Box<dyn ByteStream>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("port", &self.port).finish()
    }
}

/// Tries each candidate once, in order, and keeps the first that opens.
pub fn connect_first_available(
    opener: &dyn PortOpener,
    candidates: &[String],
    baud_rate: u32,
) -> Result<Connection> {
    let mut attempts = Vec::with_capacity(candidates.len());
    for port in candidates {
        match opener.open(port, baud_rate) {
            Ok(stream) => {
                log::info!("Connected to {port} at {baud_rate} baud");
                return Ok(Connection {
                    port: port.clone(),
                    stream,
                });
            }
            Err(e) => {
                log::warn!("Could not connect on {port} - {e}");
                let reason = match e {
                    RecorderError::PortOpen { reason, .. } => reason,
                    other => other.to_string(),
                };
                attempts.push(PortAttempt {
                    port: port.clone(),
                    reason,
                });
            }
        }
    }
    Err(RecorderError::NoPortAvailable { attempts })
}

/// Names of the serial ports the OS currently reports, for diagnostics.
pub fn available_port_names() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            log::debug!("could not enumerate serial ports: {e}");
            Vec::new()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeOpener;
    use super::*;

    #[test]
    fn falls_back_to_second_candidate() {
        let opener = FakeOpener::default().with_port("COM3", vec![0xAA]);
        let conn = connect_first_available(&opener, &default_ports(), DEFAULT_BAUD_RATE).unwrap();
        assert_eq!(conn.port, "COM3");
        assert_eq!(*opener.opened.lock().unwrap(), vec!["COM4", "COM3"]);
    }

    #[test]
    fn first_reachable_candidate_wins() {
        let opener = FakeOpener::default()
            .with_port("COM4", vec![])
            .with_port("COM3", vec![]);
        let conn = connect_first_available(&opener, &default_ports(), DEFAULT_BAUD_RATE).unwrap();
        assert_eq!(conn.port, "COM4");
        assert_eq!(opener.opened.lock().unwrap().len(), 1);
    }

    #[test]
    fn all_candidates_failing_is_one_combined_error() {
        let opener = FakeOpener::default();
        let err = connect_first_available(&opener, &default_ports(), DEFAULT_BAUD_RATE).unwrap_err();
        match err {
            RecorderError::NoPortAvailable { attempts } => {
                let ports: Vec<_> = attempts.iter().map(|a| a.port.as_str()).collect();
                assert_eq!(ports, ["COM4", "COM3"]);
                assert!(attempts[0].reason.contains("cannot find"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_candidate_list_fails_cleanly() {
        let err = connect_first_available(&FakeOpener::default(), &[], DEFAULT_BAUD_RATE).unwrap_err();
        assert!(matches!(err, RecorderError::NoPortAvailable { attempts } if attempts.is_empty()));
    }
}
