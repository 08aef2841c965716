// src/decoder/vendor.rs
use std::ffi::c_void;
use std::os::raw::{c_double, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use libloading::Library;
use once_cell::sync::OnceCell;

use crate::band::{BandName, BandSample, ExtendedBands, Orientation, PulseIntervals};
use crate::decoder::Decoder;
use crate::error::{RecorderError, Result};
use crate::sink::DecoderCallbacks;

/// Band values as the parser library lays them out.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct RawBandSample {
    attention: c_double,
    meditation: c_double,
    delta: c_double,
    theta: c_double,
    low_alpha: c_double,
    high_alpha: c_double,
    low_beta: c_double,
    high_beta: c_double,
    low_gamma: c_double,
    high_gamma: c_double,
}

impl From<&RawBandSample> for BandSample {
    fn from(raw: &RawBandSample) -> Self {
        BandSample::default()
            .with(BandName::Attention, raw.attention)
            .with(BandName::Meditation, raw.meditation)
            .with(BandName::Delta, raw.delta)
            .with(BandName::Theta, raw.theta)
            .with(BandName::LowAlpha, raw.low_alpha)
            .with(BandName::HighAlpha, raw.high_alpha)
            .with(BandName::LowBeta, raw.low_beta)
            .with(BandName::HighBeta, raw.high_beta)
            .with(BandName::LowGamma, raw.low_gamma)
            .with(BandName::HighGamma, raw.high_gamma)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct RawExtendedBands {
    ap: c_double,
    battery: c_double,
    version: c_double,
    gnaw: c_double,
    temperature: c_double,
    heart: c_double,
}

/// Callback table handed to `blp_parse`. `user` is echoed back unchanged.
#[repr(C)]
struct RawCallbacks {
    user: *mut c_void,
    on_eeg: extern "C" fn(*mut c_void, *const RawBandSample),
    on_extend_eeg: extern "C" fn(*mut c_void, *const RawExtendedBands),
    on_gyro: extern "C" fn(*mut c_void, c_double, c_double, c_double),
    on_rr: extern "C" fn(*mut c_void, c_double, c_double, c_double),
    on_raw: extern "C" fn(*mut c_void, c_int),
}

struct ParserApi {
    #[allow(dead_code)]
    lib: Library,
    path: PathBuf,
    create: unsafe extern "C" fn() -> *mut c_void,
    parse: unsafe extern "C" fn(*mut c_void, *const u8, usize, *const RawCallbacks) -> c_int,
    destroy: unsafe extern "C" fn(*mut c_void),
}

impl ParserApi {
    fn load(path: &Path) -> Result<Self> {
        let unavailable = |reason: String| RecorderError::DecoderLibrary {
            path: path.to_path_buf(),
            reason,
        };
        let lib = unsafe { Library::new(path) }.map_err(|e| unavailable(e.to_string()))?;
        // Safety: signatures follow the parser's published C header.
        unsafe {
            let create = *lib
                .get(b"blp_create\0")
                .map_err(|e| unavailable(e.to_string()))?;
            let parse = *lib
                .get(b"blp_parse\0")
                .map_err(|e| unavailable(e.to_string()))?;
            let destroy = *lib
                .get(b"blp_destroy\0")
                .map_err(|e| unavailable(e.to_string()))?;
            Ok(Self {
                lib,
                path: path.to_path_buf(),
                create,
                parse,
                destroy,
            })
        }
    }

    /// The library is loaded once per process; later paths are ignored.
    fn instance(path: &Path) -> Result<&'static ParserApi> {
        static API: OnceCell<ParserApi> = OnceCell::new();
        let api = API.get_or_try_init(|| Self::load(path))?;
        if api.path != path {
            log::warn!(
                "decoder library already loaded from {:?}; ignoring {:?}",
                api.path,
                path
            );
        }
        Ok(api)
    }
}

/// The closed BrainLink parser, driven through its C ABI.
pub struct VendorDecoder {
    api: &'static ParserApi,
    handle: *mut c_void,
}

// The parser handle carries no thread affinity; it is only ever used by the
// thread that owns the decoder.
unsafe impl Send for VendorDecoder {}

impl VendorDecoder {
    pub fn load(path: &Path) -> Result<Self> {
        let api = ParserApi::instance(path)?;
        let handle = unsafe { (api.create)() };
        if handle.is_null() {
            return Err(RecorderError::DecoderLibrary {
                path: path.to_path_buf(),
                reason: "blp_create returned null".into(),
            });
        }
        log::info!("loaded BrainLink parser from {:?}", api.path);
        Ok(Self { api, handle })
    }
}

impl Decoder for VendorDecoder {
    fn parse(&mut self, bytes: &[u8], callbacks: &mut dyn DecoderCallbacks) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut target: &mut dyn DecoderCallbacks = callbacks;
        let table = callback_table(&mut target);
        let code = unsafe { (self.api.parse)(self.handle, bytes.as_ptr(), bytes.len(), &table) };
        if code == 0 {
            Ok(())
        } else {
            Err(RecorderError::Decoder(code))
        }
    }
}

impl Drop for VendorDecoder {
    fn drop(&mut self) {
        unsafe { (self.api.destroy)(self.handle) };
    }
}

fn callback_table(target: &mut &mut dyn DecoderCallbacks) -> RawCallbacks {
    RawCallbacks {
        user: target as *mut &mut dyn DecoderCallbacks as *mut c_void,
        on_eeg: trampoline_eeg,
        on_extend_eeg: trampoline_extend_eeg,
        on_gyro: trampoline_gyro,
        on_rr: trampoline_rr,
        on_raw: trampoline_raw,
    }
}

/// Runs `f` against the callbacks behind `user`. A panic must not unwind into
/// the parser, so it is caught here and the frame is dropped.
fn with_callbacks(user: *mut c_void, what: &str, f: impl FnOnce(&mut dyn DecoderCallbacks)) {
    if user.is_null() {
        return;
    }
    let result = catch_unwind(AssertUnwindSafe(|| {
        let target = unsafe { &mut *(user as *mut &mut dyn DecoderCallbacks) };
        f(&mut **target);
    }));
    if result.is_err() {
        log::error!("{what} callback panicked; frame dropped");
    }
}

extern "C" fn trampoline_eeg(user: *mut c_void, raw: *const RawBandSample) {
    if raw.is_null() {
        return;
    }
    let sample = BandSample::from(unsafe { &*raw });
    with_callbacks(user, "eeg", |cb| cb.on_band_sample(sample));
}

extern "C" fn trampoline_extend_eeg(user: *mut c_void, raw: *const RawExtendedBands) {
    if raw.is_null() {
        return;
    }
    let raw = unsafe { *raw };
    let bands = ExtendedBands {
        ap: raw.ap,
        battery: raw.battery,
        version: raw.version,
        gnaw: raw.gnaw,
        temperature: raw.temperature,
        heart: raw.heart,
    };
    with_callbacks(user, "extended eeg", |cb| cb.on_extended_bands(bands));
}

extern "C" fn trampoline_gyro(user: *mut c_void, x: c_double, y: c_double, z: c_double) {
    with_callbacks(user, "gyro", |cb| cb.on_orientation(Orientation { x, y, z }));
}

extern "C" fn trampoline_rr(user: *mut c_void, rr1: c_double, rr2: c_double, rr3: c_double) {
    with_callbacks(user, "rr", |cb| cb.on_pulse(PulseIntervals { rr1, rr2, rr3 }));
}

extern "C" fn trampoline_raw(user: *mut c_void, raw: c_int) {
    let value = raw.clamp(i16::MIN as c_int, i16::MAX as c_int) as i16;
    with_callbacks(user, "raw", |cb| cb.on_raw(value));
}
