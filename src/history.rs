use crate::error::FetchError;
use crate::model::bar::Bar;

/// Per-bar values derived from the retained window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarStats {
    pub change_pct: f64,
    pub amplitude_pct: f64,
}

/// The most recent `window` daily bars, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleHistory {
    bars: Vec<Bar>,
    stats: Vec<BarStats>,
    window: usize,
}

impl CandleHistory {
    /// Build a window from provider rows. Rows that break the OHLC invariant
    /// are dropped, the rest are ordered by date (last row wins on a
    /// duplicate date) and only the newest `window` are kept.
    pub fn from_fetched(rows: &[Bar], window: usize) -> Self {
        assert!(window > 0, "window must be > 0");
        let mut bars: Vec<Bar> = Vec::with_capacity(rows.len());
        for row in rows {
            if let Err(e) = row.validate() {
                tracing::warn!(error = %e, "Dropping malformed bar from history");
                continue;
            }
            bars.push(row.clone());
        }
        // Stable sort keeps provider order within a date, so dedup below
        // retains the latest occurrence.
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(prev) if prev.date == bar.date => *prev = bar,
                _ => deduped.push(bar),
            }
        }
        if deduped.len() > window {
            let excess = deduped.len() - window;
            deduped.drain(..excess);
        }
        let stats = deduped
            .iter()
            .map(|b| BarStats {
                change_pct: b.change_pct(),
                amplitude_pct: b.amplitude_pct(),
            })
            .collect();
        Self {
            bars: deduped,
            stats,
            window,
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn stats(&self) -> &[BarStats] {
        &self.stats
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// `(first, last)` dates covered by the window.
    pub fn date_range(&self) -> Option<(chrono::NaiveDate, chrono::NaiveDate)> {
        Some((self.bars.first()?.date, self.bars.last()?.date))
    }
}

/// Lifecycle of the history snapshot shown on the chart.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryState {
    Empty,
    Loading,
    Loaded(CandleHistory),
    Refreshing(CandleHistory),
    Failed {
        last_good: Option<CandleHistory>,
        error: FetchError,
    },
}

impl HistoryState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Loaded(_) => "loaded",
            Self::Refreshing(_) => "refreshing",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Owns the refresh state machine. A failed fetch never discards the last
/// good snapshot.
#[derive(Debug)]
pub struct HistoryBook {
    state: HistoryState,
    window: usize,
    last_rows: Vec<Bar>,
}

impl HistoryBook {
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "window must be > 0");
        Self {
            state: HistoryState::Empty,
            window,
            last_rows: Vec::new(),
        }
    }

    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Snapshot currently safe to draw, if any.
    pub fn current(&self) -> Option<&CandleHistory> {
        match &self.state {
            HistoryState::Loaded(h) | HistoryState::Refreshing(h) => Some(h),
            HistoryState::Failed { last_good, .. } => last_good.as_ref(),
            HistoryState::Empty | HistoryState::Loading => None,
        }
    }

    pub fn is_fetching(&self) -> bool {
        matches!(
            self.state,
            HistoryState::Loading | HistoryState::Refreshing(_)
        )
    }

    /// Enter `Loading` or `Refreshing`. Returns `false` when a fetch is
    /// already in flight and the caller should not start another one.
    pub fn begin_fetch(&mut self) -> bool {
        let prev = std::mem::replace(&mut self.state, HistoryState::Empty);
        let (next, started) = match prev {
            HistoryState::Empty => (HistoryState::Loading, true),
            HistoryState::Loaded(h) => (HistoryState::Refreshing(h), true),
            HistoryState::Failed {
                last_good: Some(h), ..
            } => (HistoryState::Refreshing(h), true),
            HistoryState::Failed {
                last_good: None, ..
            } => (HistoryState::Loading, true),
            in_flight @ (HistoryState::Loading | HistoryState::Refreshing(_)) => {
                (in_flight, false)
            }
        };
        self.state = next;
        started
    }

    /// Apply a fetch result and return the published snapshot on success.
    /// A result with no valid bar counts as a failed fetch.
    pub fn complete(&mut self, result: Result<Vec<Bar>, FetchError>) -> Option<&CandleHistory> {
        let prev = std::mem::replace(&mut self.state, HistoryState::Empty);
        let loaded = result.and_then(|rows| {
            let history = CandleHistory::from_fetched(&rows, self.window);
            if history.is_empty() {
                return Err(FetchError::Parse(format!(
                    "no valid bars among {} fetched rows",
                    rows.len()
                )));
            }
            Ok((rows, history))
        });
        match loaded {
            Ok((rows, history)) => {
                tracing::info!(
                    fetched = rows.len(),
                    retained = history.len(),
                    window = self.window,
                    "History loaded"
                );
                self.last_rows = rows;
                self.state = HistoryState::Loaded(history);
            }
            Err(error) => {
                let last_good = match prev {
                    HistoryState::Loaded(h) | HistoryState::Refreshing(h) => Some(h),
                    HistoryState::Failed { last_good, .. } => last_good,
                    HistoryState::Empty | HistoryState::Loading => None,
                };
                tracing::warn!(
                    error = %error,
                    kept_snapshot = last_good.is_some(),
                    "History fetch failed"
                );
                self.state = HistoryState::Failed { last_good, error };
            }
        }
        match &self.state {
            HistoryState::Loaded(h) => Some(h),
            _ => None,
        }
    }

    /// Change the window size and re-derive the snapshot from the rows of
    /// the last successful fetch.
    pub fn set_window(&mut self, window: usize) {
        assert!(window > 0, "window must be > 0");
        self.window = window;
        if self.last_rows.is_empty() {
            return;
        }
        let rebuilt = CandleHistory::from_fetched(&self.last_rows, window);
        self.state = match std::mem::replace(&mut self.state, HistoryState::Empty) {
            HistoryState::Loaded(_) => HistoryState::Loaded(rebuilt),
            HistoryState::Refreshing(_) => HistoryState::Refreshing(rebuilt),
            HistoryState::Failed { error, .. } => HistoryState::Failed {
                last_good: Some(rebuilt),
                error,
            },
            other => other,
        };
    }

    /// Forget everything, e.g. when switching instrument.
    pub fn reset(&mut self) {
        self.state = HistoryState::Empty;
        self.last_rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> Bar {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(day as u64);
        Bar::new(d, 10.0, close.max(10.0) + 0.5, close.min(10.0) - 0.5, close, 100)
    }

    #[test]
    fn duplicate_dates_keep_last_row() {
        let mut second = bar(0, 11.0);
        second.volume = 999;
        let h = CandleHistory::from_fetched(&[bar(0, 10.5), second.clone(), bar(1, 9.0)], 30);
        assert_eq!(h.len(), 2);
        assert_eq!(h.bars()[0], second);
    }

    #[test]
    fn unsorted_rows_are_ordered() {
        let h = CandleHistory::from_fetched(&[bar(3, 10.0), bar(1, 10.0), bar(2, 10.0)], 30);
        let days: Vec<_> = h.bars().iter().map(|b| b.date).collect();
        let mut sorted = days.clone();
        sorted.sort();
        assert_eq!(days, sorted);
    }

    #[test]
    fn begin_fetch_while_loading_is_rejected() {
        let mut book = HistoryBook::new(30);
        assert!(book.begin_fetch());
        assert!(!book.begin_fetch());
        assert_eq!(book.state().label(), "loading");
    }

    #[test]
    fn set_window_rederives_from_last_rows() {
        let rows: Vec<Bar> = (0..60).map(|i| bar(i, 10.2)).collect();
        let mut book = HistoryBook::new(30);
        book.begin_fetch();
        book.complete(Ok(rows));
        assert_eq!(book.current().unwrap().len(), 30);
        book.set_window(50);
        assert_eq!(book.current().unwrap().len(), 50);
        assert_eq!(book.current().unwrap().window(), 50);
    }
}
