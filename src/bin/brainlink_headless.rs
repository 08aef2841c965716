// src/bin/brainlink_headless.rs
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use brainlink_recorder::config::RecorderConfig;
use brainlink_recorder::export::export_to_path;
use brainlink_recorder::metrics::write_summary;
use brainlink_recorder::recorder::Recorder;
use brainlink_recorder::transport::available_port_names;
use brainlink_recorder::types::ConnectionMode;

#[derive(Parser)]
#[command(
    name = "brainlink-headless",
    version,
    about = "Record a BrainLink Lite session without the GUI and print band averages"
)]
struct Cli {
    /// Recording length in seconds
    #[arg(long, default_value_t = 180)]
    seconds: u64,

    /// Candidate serial port, tried in the order given (overrides config)
    #[arg(long = "port")]
    ports: Vec<String>,

    /// Baud rate (overrides config)
    #[arg(long)]
    baud: Option<u32>,

    /// Use the simulated headset instead of a serial device
    #[arg(long)]
    simulate: bool,

    /// Also write the session to this CSV file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .init();

    let mut config = RecorderConfig::load().context("failed to load configuration")?;
    if !cli.ports.is_empty() {
        config.ports = cli.ports.clone();
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    let mode = if cli.simulate {
        ConnectionMode::Simulation
    } else {
        config.mode
    };
    config.validate()?;

    let mut recorder = Recorder::new(config);
    let port = match recorder.start(mode) {
        Ok(port) => port,
        Err(e) => {
            let seen = available_port_names();
            if !seen.is_empty() {
                eprintln!("Ports visible on this machine: {}", seen.join(", "));
            }
            return Err(e).context("could not start recording");
        }
    };
    println!("Recording EEG signals on {port} for {} seconds...", cli.seconds);

    let deadline = Instant::now() + Duration::from_secs(cli.seconds);
    while Instant::now() < deadline {
        if !recorder.is_acquiring() {
            eprintln!("Device stopped sending data; ending early.");
            break;
        }
        thread::sleep(Duration::from_millis(200));
    }

    println!("\nReleasing serial port.");
    recorder.stop()?;
    println!("Port closed.");

    let session = recorder.session();
    let history = session.history_snapshot();
    // frozen at stop, so an early end reports the real recording time
    let elapsed = session.lock().elapsed();
    println!();
    write_summary(&history, elapsed.as_secs(), io::stdout().lock())
        .context("failed to print summary")?;

    if let Some(path) = cli.export {
        let rows = export_to_path(&history, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved {rows} rows to {}", path.display());
    }
    Ok(())
}
