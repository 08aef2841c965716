// src/band.rs
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Named values reported by the headset firmware, in export column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BandName {
    Attention,
    Meditation,
    Delta,
    Theta,
    LowAlpha,
    HighAlpha,
    LowBeta,
    HighBeta,
    LowGamma,
    HighGamma,
}

impl BandName {
    pub const COUNT: usize = 10;

    pub const ALL: [BandName; Self::COUNT] = [
        BandName::Attention,
        BandName::Meditation,
        BandName::Delta,
        BandName::Theta,
        BandName::LowAlpha,
        BandName::HighAlpha,
        BandName::LowBeta,
        BandName::HighBeta,
        BandName::LowGamma,
        BandName::HighGamma,
    ];

    /// Key used by the decoder and in the CSV header.
    pub fn as_str(self) -> &'static str {
        match self {
            BandName::Attention => "attention",
            BandName::Meditation => "meditation",
            BandName::Delta => "delta",
            BandName::Theta => "theta",
            BandName::LowAlpha => "lowAlpha",
            BandName::HighAlpha => "highAlpha",
            BandName::LowBeta => "lowBeta",
            BandName::HighBeta => "highBeta",
            BandName::LowGamma => "lowGamma",
            BandName::HighGamma => "highGamma",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown band name '{0}'")]
pub struct UnknownBand(pub String);

impl FromStr for BandName {
    type Err = UnknownBand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BandName::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| UnknownBand(s.to_owned()))
    }
}

/// One decoded reading: attention/meditation indices plus eight band powers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandSample {
    values: [f64; BandName::COUNT],
}

impl BandSample {
    pub fn new(values: [f64; BandName::COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, band: BandName) -> f64 {
        self.values[band.index()]
    }

    pub fn set(&mut self, band: BandName, value: f64) {
        self.values[band.index()] = value;
    }

    /// Builder-style setter, handy when only a few bands matter.
    pub fn with(mut self, band: BandName, value: f64) -> Self {
        self.set(band, value);
        self
    }

    pub fn values(&self) -> &[f64; BandName::COUNT] {
        &self.values
    }

    /// First band holding NaN or infinity, if any.
    pub fn first_non_finite(&self) -> Option<BandName> {
        BandName::ALL
            .iter()
            .copied()
            .find(|b| !self.get(*b).is_finite())
    }
}

/// Payload of the extended-band callback. Not recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExtendedBands {
    pub ap: f64,
    pub battery: f64,
    pub version: f64,
    pub gnaw: f64,
    pub temperature: f64,
    pub heart: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// RR intervals from the pulse sensor, when the headset has one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PulseIntervals {
    pub rr1: f64,
    pub rr2: f64,
    pub rr3: f64,
}
