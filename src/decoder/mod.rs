// src/decoder/mod.rs
// 解码边界：厂商解析器 (动态库) 与模拟头戴设备
pub mod simulated;
pub mod vendor;

use std::collections::VecDeque;

use crate::band::BandSample;
use crate::error::Result;
use crate::sink::DecoderCallbacks;

pub use simulated::SimulatedHeadset;
pub use vendor::VendorDecoder;

/// Turns raw transport bytes into callback invocations.
///
/// Implementations keep their own framing state between calls, so a frame
/// split across two reads is still delivered once.
pub trait Decoder: Send {
    fn parse(&mut self, bytes: &[u8], callbacks: &mut dyn DecoderCallbacks) -> Result<()>;
}

/// Decoder that hands out samples queued in advance. Useful for tests and
/// deterministic playback.
#[derive(Default)]
pub struct ScriptedDecoder {
    queue: VecDeque<BandSample>,
}

impl ScriptedDecoder {
    pub fn new(samples: impl IntoIterator<Item = BandSample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
        }
    }
}

impl Decoder for ScriptedDecoder {
    /// Emits one queued sample per non-empty chunk of bytes.
    fn parse(&mut self, bytes: &[u8], callbacks: &mut dyn DecoderCallbacks) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if let Some(sample) = self.queue.pop_front() {
            callbacks.on_band_sample(sample);
        }
        Ok(())
    }
}
