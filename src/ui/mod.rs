pub mod chart;
pub mod dashboard;
pub mod surface;

use chrono::{DateTime, Local};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use crate::event::AppEvent;
use crate::history::HistoryBook;
use crate::model::instrument::InstrumentInfo;
use crate::model::tick::Tick;
use crate::sampler::Baseline;
use crate::scheduler::TickSink;
use crate::session::LiveSession;

use chart::{render_chart, CandleChart, ChartOptions};
use dashboard::{InfoPanel, KeybindBar, LogPanel, PriceStreamPanel, StatsPanel, StatusBar};
use surface::ChartFrame;

const MAX_LOG_MESSAGES: usize = 200;

pub struct AppState {
    pub instrument: String,
    pub provider_label: String,
    pub book: HistoryBook,
    pub session: LiveSession,
    pub info: InstrumentInfo,
    pub chart_options: ChartOptions,
    pub sampling: bool,
    /// Run id of the sampler run started last.
    pub sampler_run: u64,
    pub period_secs: u64,
    pub log_messages: Vec<String>,
    baseline: Baseline,
    chart: ChartFrame,
    chart_dirty: bool,
    last_update: Option<DateTime<Local>>,
}

impl AppState {
    pub fn new(
        instrument: &str,
        provider_label: &str,
        window: usize,
        stream_capacity: usize,
        overlay_len: usize,
        period_secs: u64,
    ) -> Self {
        Self {
            instrument: instrument.to_string(),
            provider_label: provider_label.to_string(),
            book: HistoryBook::new(window),
            session: LiveSession::new(stream_capacity, overlay_len),
            info: InstrumentInfo::default(),
            chart_options: ChartOptions::default(),
            sampling: false,
            sampler_run: 0,
            period_secs,
            log_messages: Vec::new(),
            baseline: Baseline::new(),
            chart: ChartFrame::default(),
            chart_dirty: true,
            last_update: None,
        }
    }

    /// Handle shared with the sampler; follows the last loaded close.
    pub fn baseline(&self) -> Baseline {
        self.baseline.clone()
    }

    pub fn chart_frame(&self) -> &ChartFrame {
        &self.chart
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    pub fn push_log(&mut self, msg: String) {
        self.log_messages.push(msg);
        if self.log_messages.len() > MAX_LOG_MESSAGES {
            self.log_messages.remove(0);
        }
    }

    /// Mark a history fetch as started. `false` means one is already running.
    pub fn begin_load(&mut self) -> bool {
        let started = self.book.begin_fetch();
        if !started {
            self.push_log("[WARN] History fetch already in progress".to_string());
        }
        started
    }

    /// Forget everything about the current instrument and point at `code`.
    /// The caller stops sampling and starts a fetch for the new code.
    pub fn switch_instrument(&mut self, code: &str) {
        self.instrument = code.to_string();
        self.book.reset();
        self.session.reset();
        self.info = InstrumentInfo::default();
        self.baseline.set(None);
        self.last_update = None;
        self.chart_dirty = true;
        self.push_log(format!("Switched to {}", code));
    }

    pub fn set_window(&mut self, window: usize) {
        self.book.set_window(window);
        self.baseline
            .set(self.book.current().and_then(|h| h.last()).map(|b| b.close));
        self.chart_dirty = true;
        self.push_log(format!("Chart window: {} bars", window));
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::HistoryFetched { instrument, result } => {
                if instrument != self.instrument {
                    tracing::debug!(instrument = %instrument, "Ignoring history for inactive instrument");
                    return;
                }
                match result {
                    Ok(rows) => {
                        let fetched = rows.len();
                        let close = self
                            .book
                            .complete(Ok(rows))
                            .and_then(|h| h.last())
                            .map(|b| b.close);
                        self.chart_dirty = true;
                        match close {
                            Some(close) => {
                                self.baseline.set(Some(close));
                                let retained = self.book.current().map_or(0, |h| h.len());
                                self.push_log(format!(
                                    "Loaded {} bars for {} ({} fetched)",
                                    retained, instrument, fetched
                                ));
                            }
                            None => self.push_log(format!(
                                "[ERR] History for {} has no valid bars ({} fetched)",
                                instrument, fetched
                            )),
                        }
                    }
                    Err(e) => {
                        self.push_log(format!("[ERR] History fetch for {} failed: {}", instrument, e));
                        self.book.complete(Err(e));
                    }
                }
            }
            AppEvent::InfoFetched { instrument, result } => {
                if instrument != self.instrument {
                    return;
                }
                match result {
                    Ok(info) => self.info = info,
                    Err(e) => self.push_log(format!("[WARN] Quote for {} unavailable: {}", instrument, e)),
                }
            }
            AppEvent::SamplerStopped { run, reason } => {
                if run != self.sampler_run {
                    tracing::debug!(run, current = self.sampler_run, "Ignoring stop of an earlier sampler run");
                    return;
                }
                self.sampling = false;
                match reason {
                    Some(e) => self.push_log(format!("[ERR] Sampling stopped: {}", e)),
                    None => self.push_log("Sampling stopped".to_string()),
                }
            }
            AppEvent::ExportFinished { path, rows } => {
                self.push_log(format!("Exported {} rows to {}", rows, path.display()));
            }
            AppEvent::LogMessage(msg) => {
                self.push_log(msg);
            }
            AppEvent::Error(msg) => {
                self.push_log(format!("[ERR] {}", msg));
            }
        }
    }

    fn chart_title(&self) -> String {
        let name = if self.info.display_name.is_empty() {
            self.instrument.as_str()
        } else {
            self.info.display_name.as_str()
        };
        format!(
            " {} {} | daily K ({}) | {} ",
            self.instrument,
            name,
            self.book.window(),
            self.book.state().label()
        )
    }
}

impl TickSink for AppState {
    fn apply_tick(&mut self, tick: &Tick) {
        self.session.apply(tick);
        self.last_update = Some(tick.timestamp);
    }

    fn refresh_clock(&mut self, now: DateTime<Local>) {
        self.session.set_clock(now);
    }

    fn needs_redraw(&self) -> bool {
        self.chart_dirty
    }

    fn redraw(&mut self) {
        let bars = self.book.current().map(|h| h.bars()).unwrap_or(&[]);
        let overlay = self.session.overlay();
        let mut frame = ChartFrame::new(bars.len());
        let report = render_chart(&mut frame, bars, &overlay, &self.chart_options);
        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, drawn = report.drawn, "Chart drawn with skipped bars");
        }
        self.chart = frame;
        self.chart_dirty = false;
    }
}

pub fn render(frame: &mut Frame, state: &AppState) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(12),   // chart + side panels
            Constraint::Length(6), // log
            Constraint::Length(1), // keybinds
        ])
        .split(frame.area());

    frame.render_widget(
        StatusBar {
            instrument: &state.instrument,
            provider: &state.provider_label,
            sampling: state.sampling,
            period_secs: state.period_secs,
            history_state: state.book.state().label(),
            clock: state.session.clock(),
        },
        outer[0],
    );

    let main_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(30)])
        .split(outer[1]);

    frame.render_widget(
        CandleChart::new(state.chart_frame()).title(state.chart_title()),
        main_area[0],
    );

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Min(4),
        ])
        .split(main_area[1]);

    frame.render_widget(
        InfoPanel::new(&state.info, state.session.latest()),
        side[0],
    );
    frame.render_widget(
        StatsPanel {
            tick_count: state.session.tick_count(),
            last_update: state.last_update,
            latency_us: state.session.latest().map(|t| t.latency_us),
            history: state.book.current(),
        },
        side[1],
    );
    frame.render_widget(PriceStreamPanel::new(state.session.stream()), side[2]);

    frame.render_widget(LogPanel::new(&state.log_messages), outer[2]);

    frame.render_widget(KeybindBar, outer[3]);
}
