use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::event::AppEvent;
use crate::model::bar::Bar;

/// One exported CSV row. Prices keep full precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub change_pct: f64,
}

impl From<&Bar> for HistoryRecord {
    fn from(b: &Bar) -> Self {
        Self {
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
            change_pct: b.change_pct(),
        }
    }
}

impl From<HistoryRecord> for Bar {
    fn from(r: HistoryRecord) -> Self {
        Bar::new(r.date, r.open, r.high, r.low, r.close, r.volume)
    }
}

pub fn history_file_name(instrument: &str) -> String {
    format!("{}_historical_data.csv", instrument.trim())
}

/// Write bars as CSV, creating parent directories. Returns the row count.
pub fn export_csv(path: &Path, bars: &[Bar]) -> Result<usize, AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    if bars.is_empty() {
        // serde only emits the header together with the first record.
        writer.write_record([
            "date",
            "open",
            "high",
            "low",
            "close",
            "volume",
            "change_pct",
        ])?;
    }
    for bar in bars {
        writer.serialize(HistoryRecord::from(bar))?;
    }
    writer.flush()?;
    Ok(bars.len())
}

/// Read a file written by [`export_csv`] back into bars.
pub fn import_csv(path: &Path) -> Result<Vec<Bar>, AppError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for record in reader.deserialize::<HistoryRecord>() {
        bars.push(Bar::from(record?));
    }
    Ok(bars)
}

/// Fire-and-forget export on the blocking pool. Failures are only logged.
pub fn spawn_export(dir: PathBuf, instrument: &str, bars: Vec<Bar>, tx: mpsc::Sender<AppEvent>) {
    let path = dir.join(history_file_name(instrument));
    tokio::task::spawn_blocking(move || match export_csv(&path, &bars) {
        Ok(rows) => {
            tracing::info!(path = %path.display(), rows, "Exported history CSV");
            let _ = tx.try_send(AppEvent::ExportFinished { path, rows });
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "CSV export failed");
            let _ = tx.try_send(AppEvent::Error(format!("export failed: {}", e)));
        }
    });
}
