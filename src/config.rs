// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RecorderError, Result};
use crate::session::DEFAULT_PLOT_LEN;
use crate::transport::{default_ports, DEFAULT_BAUD_RATE};
use crate::types::ConnectionMode;

/// Looked up in the working directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "brainlink.json";

pub const ENV_PORTS: &str = "BRAINLINK_PORTS";
pub const ENV_BAUD: &str = "BRAINLINK_BAUD";
pub const ENV_DECODER: &str = "BRAINLINK_DECODER";

#[cfg(windows)]
const DEFAULT_DECODER_LIBRARY: &str = "BrainLinkParser.dll";
#[cfg(target_os = "macos")]
const DEFAULT_DECODER_LIBRARY: &str = "libbrainlinkparser.dylib";
#[cfg(not(any(windows, target_os = "macos")))]
const DEFAULT_DECODER_LIBRARY: &str = "libbrainlinkparser.so";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderConfig {
    /// Candidate ports, tried in order.
    pub ports: Vec<String>,
    pub baud_rate: u32,
    /// Points kept by each live plot.
    pub plot_len: usize,
    pub plot_update_ms: u64,
    pub display_update_ms: u64,
    /// How often the acquisition thread checks for a stop request.
    pub poll_interval_ms: u64,
    pub decoder_library: PathBuf,
    pub mode: ConnectionMode,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            baud_rate: DEFAULT_BAUD_RATE,
            plot_len: DEFAULT_PLOT_LEN,
            plot_update_ms: 250,
            display_update_ms: 1000,
            poll_interval_ms: 200,
            decoder_library: PathBuf::from(DEFAULT_DECODER_LIBRARY),
            mode: ConnectionMode::Hardware,
        }
    }
}

impl RecorderConfig {
    /// `./brainlink.json` if present, otherwise defaults; then env overrides.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecorderError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| RecorderError::Config(format!("{}: {e}", path.display())))?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `BRAINLINK_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(ports) = lookup(ENV_PORTS) {
            self.ports = ports
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(baud) = lookup(ENV_BAUD) {
            self.baud_rate = baud
                .trim()
                .parse()
                .map_err(|_| RecorderError::Config(format!("{ENV_BAUD}={baud} is not a baud rate")))?;
        }
        if let Some(lib) = lookup(ENV_DECODER) {
            self.decoder_library = PathBuf::from(lib);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == ConnectionMode::Hardware && self.ports.is_empty() {
            return Err(RecorderError::Config("no candidate ports configured".into()));
        }
        if self.baud_rate == 0 {
            return Err(RecorderError::Config("baud_rate must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(RecorderError::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn plot_update_interval(&self) -> Duration {
        Duration::from_millis(self.plot_update_ms)
    }

    pub fn display_update_interval(&self) -> Duration {
        Duration::from_millis(self.display_update_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_the_headset_setup() {
        let c = RecorderConfig::default();
        assert_eq!(c.ports, ["COM4", "COM3"]);
        assert_eq!(c.baud_rate, 115_200);
        assert_eq!(c.plot_len, 200);
        assert_eq!(c.plot_update_interval(), Duration::from_millis(250));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "ports": ["/dev/rfcomm0"], "mode": "simulation" }}"#).unwrap();
        let c = RecorderConfig::from_file(file.path()).unwrap();
        assert_eq!(c.ports, ["/dev/rfcomm0"]);
        assert_eq!(c.mode, ConnectionMode::Simulation);
        assert_eq!(c.baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "port": "COM9" }}"#).unwrap();
        assert!(matches!(
            RecorderConfig::from_file(file.path()),
            Err(RecorderError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_PORTS, "COM7, COM8,"),
            (ENV_BAUD, "57600"),
            (ENV_DECODER, "/opt/blp/libbrainlinkparser.so"),
        ]
        .into_iter()
        .collect();
        let mut c = RecorderConfig::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.ports, ["COM7", "COM8"]);
        assert_eq!(c.baud_rate, 57_600);
        assert_eq!(c.decoder_library, PathBuf::from("/opt/blp/libbrainlinkparser.so"));
    }

    #[test]
    fn bad_baud_override_is_a_config_error() {
        let mut c = RecorderConfig::default();
        let err = c
            .apply_env(|k| (k == ENV_BAUD).then(|| "fast".to_owned()))
            .unwrap_err();
        assert!(err.to_string().contains("BRAINLINK_BAUD"));
    }

    #[test]
    fn hardware_mode_needs_ports() {
        let c = RecorderConfig {
            ports: vec![],
            ..Default::default()
        };
        assert!(c.validate().is_err());
        let sim = RecorderConfig {
            ports: vec![],
            mode: ConnectionMode::Simulation,
            ..Default::default()
        };
        assert!(sim.validate().is_ok());
    }
}
