// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
use anyhow::Context;
use brainlink_recorder::config::RecorderConfig;
use brainlink_recorder::gui::BrainLinkApp;
use eframe::egui;

// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = RecorderConfig::load().context("failed to load brainlink.json")?;
    log::info!(
        "candidate ports {:?} at {} baud, decoder {:?}",
        config.ports,
        config.baud_rate,
        config.decoder_library
    );

    let ports = config.ports.join(" -> ");
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([980.0, 620.0])
        .with_min_inner_size([760.0, 480.0])
        .with_title(format!("BrainLink Lite v2.0 Recorder ({ports})"));
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "BrainLink Recorder",
        options,
        Box::new(move |_cc| Box::new(BrainLinkApp::new(config))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {e}"))
}
