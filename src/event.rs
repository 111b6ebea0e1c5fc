use std::path::PathBuf;

use crate::error::{FetchError, SamplerError};
use crate::model::bar::Bar;
use crate::model::instrument::InstrumentInfo;

/// Completion reports from background work, drained by the UI loop.
#[derive(Debug, Clone)]
pub enum AppEvent {
    HistoryFetched {
        instrument: String,
        result: Result<Vec<Bar>, FetchError>,
    },
    InfoFetched {
        instrument: String,
        result: Result<InstrumentInfo, FetchError>,
    },
    SamplerStopped {
        run: u64,
        reason: Option<SamplerError>,
    },
    ExportFinished {
        path: PathBuf,
        rows: usize,
    },
    LogMessage(String),
    Error(String),
}
