// src/gui.rs
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Instant;

use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{Legend, Line, Plot, PlotPoints};

use crate::band::BandName;
use crate::config::RecorderConfig;
use crate::engine;
use crate::export::default_file_name;
use crate::metrics::BandAverages;
use crate::recorder::Recorder;
use crate::session::SharedSession;
use crate::types::*;

const MAX_LOG_LINES: usize = 500;

/// Bands shown in the live averages panel, in display order.
const AVERAGE_ROWS: [BandName; 6] = [
    BandName::Attention,
    BandName::Meditation,
    BandName::LowAlpha,
    BandName::HighAlpha,
    BandName::LowBeta,
    BandName::HighBeta,
];

enum Dialog {
    Error { title: String, body: String },
    Info { title: String, body: String },
    ConfirmQuit,
}

pub struct BrainLinkApp {
    config: RecorderConfig,
    session: SharedSession,

    // 系统状态
    connection_mode: ConnectionMode,
    is_connecting: bool,
    is_recording: bool,
    can_save: bool,
    connected_port: Option<String>,

    // 显示数据
    averages: BandAverages,
    duration_secs: u64,
    ratio_points: Vec<[f64; 2]>,
    attention_points: Vec<[f64; 2]>,
    last_display: Option<Instant>,
    last_plot: Option<Instant>,

    // 界面日志与弹窗
    log_messages: Vec<String>,
    dialog: Option<Dialog>,
    quit_requested: bool,

    // 通讯管道
    rx: Receiver<AppMessage>,
    tx_cmd: Sender<GuiCommand>,
    engine: Option<JoinHandle<()>>,
}

impl BrainLinkApp {
    pub fn new(config: RecorderConfig) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let recorder = Recorder::new(config.clone());
        let session = recorder.session();
        // 启动后台引擎
        let engine = engine::spawn_thread(recorder, tx, rx_cmd);

        Self {
            connection_mode: config.mode,
            config,
            session,
            is_connecting: false,
            is_recording: false,
            can_save: false,
            connected_port: None,
            averages: BandAverages::default(),
            duration_secs: 0,
            ratio_points: Vec::new(),
            attention_points: Vec::new(),
            last_display: None,
            last_plot: None,
            log_messages: Vec::new(),
            dialog: None,
            quit_requested: false,
            rx,
            tx_cmd,
            engine: Some(engine),
        }
    }

    fn log(&mut self, msg: impl Into<String>) {
        self.log_messages.push(msg.into());
        if self.log_messages.len() > MAX_LOG_LINES {
            let excess = self.log_messages.len() - MAX_LOG_LINES;
            self.log_messages.drain(..excess);
        }
    }

    fn send(&mut self, cmd: GuiCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            log::error!("engine thread is gone");
            self.dialog = Some(Dialog::Error {
                title: "Recorder error".into(),
                body: "The recorder engine stopped unexpectedly.".into(),
            });
        }
    }

    fn start_recording(&mut self) {
        if self.is_recording || self.is_connecting {
            return;
        }
        self.log_messages.clear();
        self.ratio_points.clear();
        self.attention_points.clear();
        self.averages = BandAverages::default();
        self.duration_secs = 0;
        self.is_connecting = true;
        self.can_save = false;
        self.send(GuiCommand::Start(self.connection_mode));
    }

    fn stop_recording(&mut self) {
        if !self.is_recording {
            return;
        }
        self.send(GuiCommand::Stop);
    }

    fn save_csv(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("CSV files", &["csv"])
            .set_file_name(&default_file_name())
            .save_file();
        if let Some(path) = picked {
            self.send(GuiCommand::Export(with_csv_extension(path)));
        }
    }

    fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Log(s) => self.log(s),
            AppMessage::Connected(port) => {
                self.is_connecting = false;
                self.connected_port = Some(port);
                self.last_display = None;
                self.last_plot = None;
            }
            AppMessage::ConnectFailed(err) => {
                self.is_connecting = false;
                let ports = self.config.ports.join(" or ");
                self.dialog = Some(Dialog::Error {
                    title: "Connection error".into(),
                    body: format!("Could not connect to BrainLink Lite on {ports}:\n{err}"),
                });
            }
            AppMessage::Recording(on) => {
                self.is_recording = on;
                if !on {
                    self.can_save = true;
                    self.connected_port = None;
                    self.refresh_averages();
                    self.refresh_plot();
                }
            }
            AppMessage::FinalRatio(r) => self.log(format!("Final α/β Ratio: {r:.3}")),
            AppMessage::Exported { path, rows } => {
                self.log(format!("Saved {rows} rows to {}", path.display()));
                self.dialog = Some(Dialog::Info {
                    title: "Saved".into(),
                    body: format!("Saved session to {}", path.display()),
                });
            }
            AppMessage::ExportFailed(err) => {
                self.dialog = Some(Dialog::Error {
                    title: "Save failed".into(),
                    body: err,
                });
            }
        }
    }

    /// Recomputes the averages panel and duration.
    fn refresh_averages(&mut self) {
        let (averages, elapsed) = {
            let session = self.session.lock();
            (BandAverages::from_history(session.history()), session.elapsed())
        };
        self.averages = averages;
        self.duration_secs = elapsed.as_secs();
    }

    /// Periodic display update while recording; logs the running ratio.
    fn refresh_display(&mut self) {
        self.refresh_averages();
        self.log(format!("Ratio: {:.3}", self.averages.alpha_beta_ratio));
    }

    fn refresh_plot(&mut self) {
        let session = self.session.lock();
        self.ratio_points = session.window().ratio_points();
        self.attention_points = session.window().attention_points();
    }

    fn tick(&mut self, ctx: &egui::Context) {
        if !self.is_recording {
            return;
        }
        let now = Instant::now();
        let display_due = self
            .last_display
            .map_or(true, |t| now - t >= self.config.display_update_interval());
        if display_due {
            self.refresh_display();
            self.last_display = Some(now);
        }
        let plot_due = self
            .last_plot
            .map_or(true, |t| now - t >= self.config.plot_update_interval());
        if plot_due {
            self.refresh_plot();
            self.last_plot = Some(now);
        }
        ctx.request_repaint_after(
            self.config
                .plot_update_interval()
                .min(self.config.display_update_interval()),
        );
    }

    fn request_quit(&mut self, ctx: &egui::Context) {
        if self.is_recording {
            self.dialog = Some(Dialog::ConfirmQuit);
            return;
        }
        self.quit_requested = true;
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = &self.dialog else {
            return;
        };
        let mut close = false;
        let mut quit = false;
        match dialog {
            Dialog::Error { title, body } | Dialog::Info { title, body } => {
                let is_error = matches!(dialog, Dialog::Error { .. });
                egui::Window::new(title.as_str())
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .show(ctx, |ui| {
                        let text = RichText::new(body.as_str());
                        ui.label(if is_error { text.color(Color32::LIGHT_RED) } else { text });
                        if ui.button("OK").clicked() {
                            close = true;
                        }
                    });
            }
            Dialog::ConfirmQuit => {
                egui::Window::new("Quit")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .show(ctx, |ui| {
                        ui.label("Recording in progress. Stop and quit?");
                        ui.horizontal(|ui| {
                            if ui.button("Yes").clicked() {
                                quit = true;
                            }
                            if ui.button("No").clicked() {
                                close = true;
                            }
                        });
                    });
            }
        }
        if close || quit {
            self.dialog = None;
        }
        if quit {
            self.stop_recording();
            self.quit_requested = true;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            let idle = !self.is_recording && !self.is_connecting;
            ui.add_enabled_ui(idle, |ui| {
                ui.selectable_value(&mut self.connection_mode, ConnectionMode::Simulation, "SIM");
                ui.selectable_value(&mut self.connection_mode, ConnectionMode::Hardware, "REAL");
            });
            ui.separator();
            if ui.add_enabled(idle, egui::Button::new("Start")).clicked() {
                self.start_recording();
            }
            if ui
                .add_enabled(self.is_recording, egui::Button::new("Stop"))
                .clicked()
            {
                self.stop_recording();
            }
            if ui
                .add_enabled(self.can_save && idle, egui::Button::new("Save CSV"))
                .clicked()
            {
                self.save_csv();
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Quit").clicked() {
                    self.request_quit(ctx);
                }
            });
        });

        ui.horizontal(|ui| {
            ui.label("Device (expected): BrainLink Lite v2.0");
            ui.add_space(12.0);
            ui.label("Port:");
            let port = match (&self.connected_port, self.is_connecting) {
                (Some(p), _) => p.clone(),
                (None, true) => "Connecting...".to_owned(),
                (None, false) => "Not connected".to_owned(),
            };
            ui.strong(port);
            ui.add_space(12.0);
            ui.label("Duration:");
            ui.strong(format!("{}s", self.duration_secs));
        });
    }

    fn averages_panel(&self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(RichText::new("Live averages").strong());
            egui::Grid::new("averages")
                .num_columns(2)
                .spacing([12.0, 4.0])
                .show(ui, |ui| {
                    for band in AVERAGE_ROWS {
                        ui.label(format!("{band}:"));
                        ui.monospace(format!("{:.2}", self.averages.mean(band)));
                        ui.end_row();
                    }
                    ui.label("Alpha/Beta Ratio:");
                    ui.monospace(format!("{:.3}", self.averages.alpha_beta_ratio));
                    ui.end_row();
                });
        });
    }

    fn plots(&self, ui: &mut egui::Ui) {
        let height = (ui.available_height() / 2.0 - 24.0).max(80.0);
        let link = egui::Id::new("live_x");

        ui.label("Alpha/Beta Ratio (live)");
        Plot::new("ratio_plot")
            .height(height)
            .legend(Legend::default())
            .link_axis(link, true, false)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(self.ratio_points.clone()))
                        .name("α/β")
                        .width(1.6),
                );
            });

        ui.label("Attention (live)");
        Plot::new("attention_plot")
            .height(height)
            .legend(Legend::default())
            .link_axis(link, true, false)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(self.attention_points.clone()))
                        .name("attention")
                        .color(Color32::from_rgb(255, 127, 14))
                        .width(1.2),
                );
            });
    }
}

fn with_csv_extension(mut path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension("csv");
    }
    path
}

impl eframe::App for BrainLinkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 消息处理
        while let Ok(msg) = self.rx.try_recv() {
            self.handle_message(msg);
        }
        if self.is_connecting {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        // 2. 定时刷新 (均值 / 曲线)
        self.tick(ctx);

        // 3. 关闭窗口时的确认
        if ctx.input(|i| i.viewport().close_requested()) && !self.quit_requested {
            if self.is_recording {
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                self.dialog = Some(Dialog::ConfirmQuit);
            } else {
                self.quit_requested = true;
            }
        }

        // 4. UI 绘制
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            self.controls(ui, ctx);
            ui.add_space(4.0);
        });

        egui::SidePanel::left("left").min_width(260.0).show(ctx, |ui| {
            self.averages_panel(ui);
            ui.add_space(8.0);
            ui.label(RichText::new("Log").strong());
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for m in &self.log_messages {
                        ui.monospace(m);
                    }
                });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.plots(ui);
        });

        self.show_dialog(ctx);
    }
}

impl Drop for BrainLinkApp {
    fn drop(&mut self) {
        self.tx_cmd.send(GuiCommand::Shutdown).ok();
        if let Some(engine) = self.engine.take() {
            if engine.join().is_err() {
                log::error!("engine thread panicked");
            }
        }
    }
}
