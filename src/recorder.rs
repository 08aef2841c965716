// src/recorder.rs
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::RecorderConfig;
use crate::decoder::{Decoder, SimulatedHeadset, VendorDecoder};
use crate::error::{RecorderError, Result};
use crate::metrics::alpha_beta_ratio_from_means;
use crate::session::{SessionState, SharedSession};
use crate::sink::{DecoderCallbacks, SessionSink, SinkStats};
use crate::transport::{connect_first_available, ByteStream, PortOpener, SerialOpener};
use crate::types::ConnectionMode;

/// Label reported as the active connection in simulation mode.
pub const SIMULATION_PORT: &str = "SIM";

/// Something the acquisition thread can pump for samples.
///
/// `pump` must return within roughly one poll interval so a stop request is
/// noticed promptly. An `Err` ends the session.
pub trait SampleSource: Send {
    fn pump(&mut self, callbacks: &mut dyn DecoderCallbacks) -> Result<()>;
}

/// Serial bytes fed through a decoder.
pub struct SerialSource {
    stream: Box<dyn ByteStream>,
    decoder: Box<dyn Decoder>,
    buf: Vec<u8>,
}

impl SerialSource {
    pub fn new(stream: Box<dyn ByteStream>, decoder: Box<dyn Decoder>) -> Self {
        Self {
            stream,
            decoder,
            buf: vec![0u8; 512],
        }
    }
}

impl SampleSource for SerialSource {
    fn pump(&mut self, callbacks: &mut dyn DecoderCallbacks) -> Result<()> {
        let n = match self.stream.read(&mut self.buf) {
            Ok(0) => {
                thread::sleep(Duration::from_millis(10));
                return Ok(());
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                return Ok(())
            }
            Err(e) => return Err(RecorderError::Read(e)),
        };
        // a frame the parser rejects is dropped; the session carries on
        if let Err(e) = self.decoder.parse(&self.buf[..n], callbacks) {
            log::warn!("parser error: {e}");
        }
        Ok(())
    }
}

type DecoderFactory = Box<dyn Fn(&RecorderConfig) -> Result<Box<dyn Decoder>> + Send>;

struct ActiveRun {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    port: String,
    stats: Arc<SinkStats>,
}

/// Owns one acquisition session at a time: connect, collect, stop.
pub struct Recorder {
    config: RecorderConfig,
    session: SharedSession,
    opener: Box<dyn PortOpener>,
    decoder_factory: DecoderFactory,
    active: Option<ActiveRun>,
}

impl Recorder {
    /// Real serial ports and the vendor parser library.
    pub fn new(config: RecorderConfig) -> Self {
        Self::with_parts(
            config,
            Box::new(SerialOpener::default()),
            Box::new(|config: &RecorderConfig| {
                let decoder = VendorDecoder::load(&config.decoder_library)?;
                Ok(Box::new(decoder) as Box<dyn Decoder>)
            }),
        )
    }

    pub fn with_parts(
        config: RecorderConfig,
        opener: Box<dyn PortOpener>,
        decoder_factory: DecoderFactory,
    ) -> Self {
        let session = SharedSession::new(SessionState::with_plot_len(config.plot_len));
        Self {
            config,
            session,
            opener,
            decoder_factory,
            active: None,
        }
    }

    /// Handle for readers (display, plots, export).
    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// False once the acquisition thread has exited on its own, e.g. after
    /// the device went away.
    pub fn is_acquiring(&self) -> bool {
        self.active
            .as_ref()
            .map(|run| !run.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn active_port(&self) -> Option<&str> {
        self.active.as_ref().map(|run| run.port.as_str())
    }

    pub fn stats(&self) -> Option<Arc<SinkStats>> {
        self.active.as_ref().map(|run| Arc::clone(&run.stats))
    }

    /// Clears the previous session, connects and starts collecting.
    /// Returns the identifier of the active connection.
    pub fn start(&mut self, mode: ConnectionMode) -> Result<String> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }
        self.session.lock().begin();

        let (port, source): (String, Box<dyn SampleSource>) = match mode {
            ConnectionMode::Simulation => (
                SIMULATION_PORT.to_owned(),
                Box::new(SimulatedHeadset::new(self.config.poll_interval())) as Box<dyn SampleSource>,
            ),
            ConnectionMode::Hardware => {
                let decoder = (self.decoder_factory)(&self.config)?;
                let conn = connect_first_available(
                    self.opener.as_ref(),
                    &self.config.ports,
                    self.config.baud_rate,
                )?;
                let source = SerialSource::new(conn.stream, decoder);
                (conn.port, Box::new(source) as Box<dyn SampleSource>)
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let sink = SessionSink::new(self.session.clone());
        let stats = sink.stats();
        let handle = spawn_acquisition(source, sink, Arc::clone(&stop), port.clone())?;
        log::info!("recording started on {port}");
        self.active = Some(ActiveRun {
            stop,
            handle,
            port: port.clone(),
            stats,
        });
        Ok(port)
    }

    /// Stops collecting, releases the port and returns the final Alpha/Beta
    /// ratio of the session means. The history stays available for export.
    pub fn stop(&mut self) -> Result<f64> {
        let run = self.active.take().ok_or(RecorderError::NotRecording)?;
        run.stop.store(true, Ordering::Relaxed);
        if run.handle.join().is_err() {
            log::error!("acquisition thread on {} panicked", run.port);
        }
        let ratio = {
            let mut session = self.session.lock();
            session.finish();
            alpha_beta_ratio_from_means(session.history())
        };
        log::info!(
            "recording on {} stopped: {} samples kept, {} dropped, final ratio {ratio:.3}",
            run.port,
            run.stats.accepted(),
            run.stats.dropped()
        );
        Ok(ratio)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.active.is_some() {
            let _ = self.stop();
        }
    }
}

fn spawn_acquisition(
    mut source: Box<dyn SampleSource>,
    mut sink: SessionSink,
    stop: Arc<AtomicBool>,
    port: String,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("acquisition-{port}"))
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if let Err(e) = source.pump(&mut sink) {
                    log::error!("acquisition on {port} ended: {e}");
                    break;
                }
            }
            // dropping the source closes the port
            drop(source);
            log::debug!("acquisition thread for {port} exiting");
        })
        .map_err(RecorderError::Thread)
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};
    use std::time::Instant;

    use super::*;
    use crate::band::{BandName, BandSample};
    use crate::decoder::ScriptedDecoder;
    use crate::transport::testing::FakeOpener;

    fn sample(la: f64, ha: f64, lb: f64, hb: f64) -> BandSample {
        BandSample::default()
            .with(BandName::LowAlpha, la)
            .with(BandName::HighAlpha, ha)
            .with(BandName::LowBeta, lb)
            .with(BandName::HighBeta, hb)
    }

    fn scripted(samples: Vec<BandSample>) -> DecoderFactory {
        Box::new(move |_: &RecorderConfig| Ok(Box::new(ScriptedDecoder::new(samples.clone())) as Box<dyn Decoder>))
    }

    fn wait_for(recorder: &Recorder, samples: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.session().history_snapshot().max_len() < samples {
            assert!(Instant::now() < deadline, "timed out waiting for samples");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn test_config() -> RecorderConfig {
        RecorderConfig {
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn records_through_second_candidate_and_reports_final_ratio() {
        // one read per chunk: each byte becomes one scripted sample
        let opener = FakeOpener::default().with_port("COM3", vec![1]);
        let mut recorder = Recorder::with_parts(
            test_config(),
            Box::new(opener),
            scripted(vec![sample(2.0, 2.0, 1.0, 1.0)]),
        );
        let port = recorder.start(ConnectionMode::Hardware).unwrap();
        assert_eq!(port, "COM3");
        assert_eq!(recorder.active_port(), Some("COM3"));
        wait_for(&recorder, 1);
        let stats = recorder.stats().unwrap();
        let ratio = recorder.stop().unwrap();
        assert_eq!(ratio, 2.0);
        assert!(!recorder.is_recording());
        assert_eq!(recorder.active_port(), None);
        assert_eq!((stats.accepted(), stats.dropped()), (1, 0));
        // the session clock stops with the recording
        let elapsed = recorder.session().lock().elapsed();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(recorder.session().lock().elapsed(), elapsed);
        // history survives stop for export
        assert_eq!(recorder.session().history_snapshot().max_len(), 1);
    }

    #[test]
    fn no_reachable_port_does_not_start() {
        let mut recorder =
            Recorder::with_parts(test_config(), Box::new(FakeOpener::default()), scripted(vec![]));
        let err = recorder.start(ConnectionMode::Hardware).unwrap_err();
        assert!(matches!(err, RecorderError::NoPortAvailable { .. }));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn second_start_is_rejected_and_stop_requires_start() {
        let opener = FakeOpener::default().with_port("COM4", vec![]);
        let mut recorder = Recorder::with_parts(test_config(), Box::new(opener), scripted(vec![]));
        assert!(matches!(recorder.stop(), Err(RecorderError::NotRecording)));
        recorder.start(ConnectionMode::Hardware).unwrap();
        assert!(matches!(
            recorder.start(ConnectionMode::Hardware),
            Err(RecorderError::AlreadyRecording)
        ));
        recorder.stop().unwrap();
    }

    #[test]
    fn new_session_clears_previous_history() {
        use std::sync::atomic::AtomicUsize;

        let opener = FakeOpener::default().with_port("COM4", vec![1]);
        let calls = Arc::new(AtomicUsize::new(0));
        let factory_calls = Arc::clone(&calls);
        // only the first session's decoder produces anything
        let factory: DecoderFactory = Box::new(move |_: &RecorderConfig| {
            let samples = if factory_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                vec![sample(1.0, 1.0, 1.0, 1.0)]
            } else {
                vec![]
            };
            Ok(Box::new(ScriptedDecoder::new(samples)) as Box<dyn Decoder>)
        });
        let mut recorder = Recorder::with_parts(test_config(), Box::new(opener), factory);
        recorder.start(ConnectionMode::Hardware).unwrap();
        wait_for(&recorder, 1);
        recorder.stop().unwrap();

        recorder.start(ConnectionMode::Hardware).unwrap();
        let session = recorder.session();
        assert!(session.history_snapshot().is_empty());
        assert!(session.lock().window().is_empty());
        recorder.stop().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
        }
    }

    #[test]
    fn read_failure_ends_acquisition_without_panicking() {
        let mut source = SerialSource::new(Box::new(Broken), Box::new(ScriptedDecoder::default()));
        let session = SharedSession::new(SessionState::with_plot_len(4));
        let mut sink = SessionSink::new(session);
        assert!(matches!(source.pump(&mut sink), Err(RecorderError::Read(_))));
    }

    #[test]
    fn simulation_mode_needs_no_port() {
        let mut recorder =
            Recorder::with_parts(test_config(), Box::new(FakeOpener::default()), scripted(vec![]));
        let port = recorder.start(ConnectionMode::Simulation).unwrap();
        assert_eq!(port, SIMULATION_PORT);
        assert!(recorder.is_acquiring());
        recorder.stop().unwrap();
    }
}
