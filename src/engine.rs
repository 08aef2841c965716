// src/engine.rs
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::export::export_to_path;
use crate::recorder::Recorder;
use crate::types::*;

/// Runs the recorder on its own thread, driven by GUI commands.
///
/// Returns once `Shutdown` arrives or the command channel closes; an
/// active recording is stopped first.
pub fn spawn_thread(
    mut recorder: Recorder,
    tx: Sender<AppMessage>,
    rx_cmd: Receiver<GuiCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        tx.send(AppMessage::Log("Recorder engine ready.".to_owned())).ok();
        let mut acquisition_lost_reported = false;

        loop {
            // 1. 命令处理
            let cmd = match rx_cmd.recv_timeout(Duration::from_millis(250)) {
                Ok(cmd) => cmd,
                Err(RecvTimeoutError::Timeout) => {
                    // 2. 采集线程意外退出 (设备断开)
                    if recorder.is_recording()
                        && !recorder.is_acquiring()
                        && !acquisition_lost_reported
                    {
                        acquisition_lost_reported = true;
                        let port = recorder.active_port().unwrap_or("device");
                        tx.send(AppMessage::Log(format!(
                            "{port} stopped sending data; press Stop to finish."
                        )))
                        .ok();
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match cmd {
                GuiCommand::Start(mode) => match recorder.start(mode) {
                    Ok(port) => {
                        acquisition_lost_reported = false;
                        tx.send(AppMessage::Connected(port.clone())).ok();
                        tx.send(AppMessage::Log(format!("Connected on {port}"))).ok();
                        tx.send(AppMessage::Recording(true)).ok();
                    }
                    Err(e) => {
                        log::error!("start failed: {e}");
                        tx.send(AppMessage::ConnectFailed(e.to_string())).ok();
                    }
                },
                GuiCommand::Stop => {
                    let stats = recorder.stats();
                    match recorder.stop() {
                        Ok(ratio) => {
                            tx.send(AppMessage::Recording(false)).ok();
                            tx.send(AppMessage::FinalRatio(ratio)).ok();
                            tx.send(AppMessage::Log("Serial port closed.".to_owned())).ok();
                            if let Some(stats) = stats {
                                tx.send(AppMessage::Log(format!(
                                    "Samples kept: {}, dropped: {}",
                                    stats.accepted(),
                                    stats.dropped()
                                )))
                                .ok();
                            }
                        }
                        Err(e) => {
                            tx.send(AppMessage::Log(format!("Stop ignored: {e}"))).ok();
                        }
                    }
                }
                GuiCommand::Export(path) => {
                    let history = recorder.session().history_snapshot();
                    match export_to_path(&history, &path) {
                        Ok(rows) => {
                            tx.send(AppMessage::Exported { path, rows }).ok();
                        }
                        Err(e) => {
                            log::error!("export to {} failed: {e}", path.display());
                            tx.send(AppMessage::ExportFailed(e.to_string())).ok();
                        }
                    }
                }
                GuiCommand::Shutdown => break,
            }
        }

        if recorder.is_recording() {
            if let Err(e) = recorder.stop() {
                log::warn!("stop during shutdown failed: {e}");
            }
        }
        log::debug!("engine thread exiting");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::*;
    use crate::band::{BandName, BandSample};
    use crate::config::RecorderConfig;
    use crate::decoder::{Decoder, ScriptedDecoder};
    use crate::transport::testing::FakeOpener;

    fn recv_until(rx: &Receiver<AppMessage>, pred: impl Fn(&AppMessage) -> bool) -> AppMessage {
        loop {
            let msg = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("engine went quiet");
            if pred(&msg) {
                return msg;
            }
        }
    }

    #[test]
    fn start_stop_export_round() {
        let opener = FakeOpener::default().with_port("COM3", vec![1]);
        let sample = BandSample::default()
            .with(BandName::LowAlpha, 2.0)
            .with(BandName::HighAlpha, 2.0)
            .with(BandName::LowBeta, 1.0)
            .with(BandName::HighBeta, 1.0);
        let recorder = Recorder::with_parts(
            RecorderConfig {
                poll_interval_ms: 10,
                ..Default::default()
            },
            Box::new(opener),
            Box::new(move |_: &RecorderConfig| {
                Ok(Box::new(ScriptedDecoder::new([sample])) as Box<dyn Decoder>)
            }),
        );
        let session = recorder.session();
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let handle = spawn_thread(recorder, tx, rx_cmd);

        tx_cmd.send(GuiCommand::Start(ConnectionMode::Hardware)).unwrap();
        match recv_until(&rx, |m| matches!(m, AppMessage::Connected(_) | AppMessage::ConnectFailed(_))) {
            AppMessage::Connected(port) => assert_eq!(port, "COM3"),
            other => panic!("unexpected {other:?}"),
        }
        while session.history_snapshot().is_empty() {
            thread::sleep(Duration::from_millis(5));
        }

        tx_cmd.send(GuiCommand::Stop).unwrap();
        match recv_until(&rx, |m| matches!(m, AppMessage::FinalRatio(_))) {
            AppMessage::FinalRatio(r) => assert_eq!(r, 2.0),
            other => panic!("unexpected {other:?}"),
        }
        match recv_until(&rx, |m| matches!(m, AppMessage::Log(s) if s.starts_with("Samples kept"))) {
            AppMessage::Log(text) => assert_eq!(text, "Samples kept: 1, dropped: 0"),
            other => panic!("unexpected {other:?}"),
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        tx_cmd.send(GuiCommand::Export(path.clone())).unwrap();
        match recv_until(&rx, |m| matches!(m, AppMessage::Exported { .. } | AppMessage::ExportFailed(_))) {
            AppMessage::Exported { rows, .. } => assert_eq!(rows, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(path.exists());

        tx_cmd.send(GuiCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn connect_failure_is_reported() {
        let recorder = Recorder::with_parts(
            RecorderConfig::default(),
            Box::new(FakeOpener::default()),
            Box::new(|_: &RecorderConfig| Ok(Box::new(ScriptedDecoder::default()) as Box<dyn Decoder>)),
        );
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let handle = spawn_thread(recorder, tx, rx_cmd);
        tx_cmd.send(GuiCommand::Start(ConnectionMode::Hardware)).unwrap();
        match recv_until(&rx, |m| matches!(m, AppMessage::Connected(_) | AppMessage::ConnectFailed(_))) {
            AppMessage::ConnectFailed(text) => {
                assert!(text.contains("COM4"));
                assert!(text.contains("COM3"));
            }
            other => panic!("unexpected {other:?}"),
        }
        drop(tx_cmd);
        handle.join().unwrap();
    }
}
