// src/types.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// 连接模式
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Simulation,
    #[default]
    Hardware,
}

// GUI 发给后台的命令
#[derive(Clone, Debug)]
pub enum GuiCommand {
    Start(ConnectionMode),
    Stop,
    Export(PathBuf),
    Shutdown,
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum AppMessage {
    Log(String),
    Connected(String),
    ConnectFailed(String),
    Recording(bool),
    FinalRatio(f64),
    Exported { path: PathBuf, rows: usize },
    ExportFailed(String),
}
