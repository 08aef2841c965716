// src/export.rs
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::band::BandName;
use crate::error::ExportError;
use crate::metrics::export_ratios;
use crate::session::SampleHistory;

pub const ALPHA_BETA_COLUMN: &str = "Alpha/Beta_Ratio";
pub const THETA_BETA_COLUMN: &str = "Theta/Beta_Ratio";

/// `index`, the ten bands in order, then both ratio columns.
pub fn header() -> Vec<&'static str> {
    let mut cols = Vec::with_capacity(BandName::COUNT + 3);
    cols.push("index");
    cols.extend(BandName::ALL.iter().map(|b| b.as_str()));
    cols.push(ALPHA_BETA_COLUMN);
    cols.push(THETA_BETA_COLUMN);
    cols
}

/// Writes the whole history as CSV and returns the number of data rows.
///
/// There is one row per index up to the longest band; a band with fewer
/// samples leaves its cell empty. Ratios are computed from the row's own
/// values and written with three decimals.
pub fn write_session<W: Write>(history: &SampleHistory, writer: W) -> Result<usize, ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(header())?;
    let rows = history.max_len();
    let mut record: Vec<String> = Vec::with_capacity(BandName::COUNT + 3);
    for i in 0..rows {
        let row = history.row(i);
        record.clear();
        record.push(i.to_string());
        record.extend(
            row.iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
        );
        let (alpha_beta, theta_beta) = export_ratios(&row);
        record.push(format!("{alpha_beta:.3}"));
        record.push(format!("{theta_beta:.3}"));
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(rows)
}

pub fn export_to_path(history: &SampleHistory, path: &Path) -> Result<usize, ExportError> {
    let file = File::create(path)?;
    let rows = write_session(history, BufWriter::new(file))?;
    log::info!("Saved session to {} ({rows} rows)", path.display());
    Ok(rows)
}

/// Suggested name for the save dialog.
pub fn default_file_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("brainlink_session_{secs}.csv")
}
