use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossterm::event::{Event, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;

use kline_watch::config::{cycle_period, toggle_window, Config};
use kline_watch::event::AppEvent;
use kline_watch::feed::export::spawn_export;
use kline_watch::feed::{spawn_fetch, Provider};
use kline_watch::input::{parse_command, UiCommand};
use kline_watch::queue::tick_queue;
use kline_watch::sampler::{RandomWalkSource, TickSampler};
use kline_watch::scheduler::UpdateScheduler;
use kline_watch::ui::{self, AppState};

/// Upper bound on waiting for the sampler task when switching instrument.
const SAMPLER_STOP_WAIT: Duration = Duration::from_millis(500);

/// Everything the key handlers act on besides the UI state.
struct Runtime {
    config: Config,
    provider: Arc<Provider>,
    instruments: Vec<String>,
    selected: usize,
    sampler: TickSampler,
    scheduler: UpdateScheduler,
    app_tx: mpsc::Sender<AppEvent>,
}

impl Runtime {
    fn load_history(&self, state: &mut AppState) {
        if state.begin_load() {
            spawn_fetch(self.provider.clone(), &state.instrument, self.app_tx.clone());
        }
    }

    fn toggle_sampling(&mut self, state: &mut AppState) {
        if self.sampler.is_running() {
            self.sampler.stop();
            return;
        }
        match self.sampler.start() {
            Ok(()) => {
                state.sampling = true;
                state.sampler_run = self.sampler.run_id();
                state.push_log(format!("Sampling every {}s", state.period_secs));
            }
            Err(e) => state.push_log(format!("[WARN] {}", e)),
        }
    }

    fn change_period(&mut self, state: &mut AppState, longer: bool) {
        let next = cycle_period(state.period_secs, longer);
        if next == state.period_secs {
            return;
        }
        self.sampler.set_period(Duration::from_secs(next));
        state.period_secs = next;
        state.push_log(format!("Sampling period: {}s", next));
    }

    fn export(&self, state: &mut AppState) {
        let bars = state
            .book
            .current()
            .filter(|h| !h.is_empty())
            .map(|h| h.bars().to_vec());
        match bars {
            Some(bars) => spawn_export(
                self.config.feed.export_dir.clone(),
                &state.instrument,
                bars,
                self.app_tx.clone(),
            ),
            None => state.push_log("[WARN] Nothing to export yet".to_string()),
        }
    }

    fn switch_instrument(&mut self, state: &mut AppState, forward: bool) {
        let n = self.instruments.len();
        if n < 2 {
            state.push_log("[WARN] Watchlist has a single instrument".to_string());
            return;
        }
        // Wait for the old run so no tick priced off the previous
        // instrument reaches the queue after the discard below.
        let sampler = &mut self.sampler;
        let stopped = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(sampler.stop_and_wait(SAMPLER_STOP_WAIT))
        });
        if !stopped {
            state.push_log("[WARN] Sampler still shutting down".to_string());
        }
        self.selected = if forward {
            (self.selected + 1) % n
        } else {
            (self.selected + n - 1) % n
        };
        let dropped = self.scheduler.discard_pending();
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded ticks of previous instrument");
        }
        state.switch_instrument(&self.instruments[self.selected]);
        self.load_history(state);
    }

    /// Returns `false` when the app should exit.
    fn handle(&mut self, cmd: UiCommand, state: &mut AppState) -> bool {
        match cmd {
            UiCommand::Quit => {
                tracing::info!("User quit");
                return false;
            }
            UiCommand::ToggleSampling => self.toggle_sampling(state),
            UiCommand::LongerPeriod => self.change_period(state, true),
            UiCommand::ShorterPeriod => self.change_period(state, false),
            UiCommand::ToggleWindow => state.set_window(toggle_window(state.book.window())),
            UiCommand::Refresh => self.load_history(state),
            UiCommand::Export => self.export(state),
            UiCommand::NextInstrument => self.switch_instrument(state, true),
            UiCommand::PrevInstrument => self.switch_instrument(state, false),
        }
        true
    }
}

fn run(
    terminal: &mut DefaultTerminal,
    rt: &mut Runtime,
    state: &mut AppState,
    app_rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<()> {
    loop {
        if rt.scheduler.is_cancelled() {
            break;
        }
        while let Ok(evt) = app_rx.try_recv() {
            state.apply(evt);
        }
        state.sampling = rt.sampler.is_running();
        rt.scheduler.poll(state, Instant::now());

        terminal.draw(|frame| ui::render(frame, state))?;

        let timeout = rt.scheduler.time_until_next(Instant::now());
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(cmd) = parse_command(&key.code) {
                    if !rt.handle(cmd, state) {
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set KLINE_WATCH_CONFIG or create config/default.toml");
            std::process::exit(1);
        }
    };

    // Log to a file so output does not interfere with the TUI.
    let log_file = std::fs::File::create("kline-watch.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.logging.level.as_str())
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    let instruments = config.feed.instruments();
    let first = instruments
        .first()
        .cloned()
        .context("no instrument configured")?;

    tracing::info!(
        instrument = %first,
        provider = ?config.feed.provider,
        period_secs = config.sampling.period_secs,
        window = config.chart.window,
        "Starting kline-watch"
    );

    let (app_tx, mut app_rx) = mpsc::channel::<AppEvent>(256);
    let provider = Arc::new(
        Provider::from_config(&config.feed).context("failed to build market data provider")?,
    );

    let mut state = AppState::new(
        &first,
        provider.name(),
        config.chart.window,
        config.ui.stream_capacity,
        config.ui.overlay_len,
        config.sampling.period_secs,
    );
    state.chart_options.target_labels = config.chart.target_labels;
    state.chart_options.doji_epsilon = config.chart.doji_epsilon;

    let (tick_tx, ticks) = tick_queue();
    let source = Arc::new(RandomWalkSource::new(
        config.sampling.max_change,
        config.sampling.seed,
    ));
    let sampler = TickSampler::new(
        source,
        tick_tx,
        state.baseline(),
        app_tx.clone(),
        config.sampling.period(),
    );
    let scheduler = UpdateScheduler::new(ticks, config.ui.refresh_rate());

    let shutdown = scheduler.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        shutdown.cancel();
    });

    let mut rt = Runtime {
        config,
        provider,
        instruments,
        selected: 0,
        sampler,
        scheduler,
        app_tx,
    };
    rt.load_history(&mut state);
    state.push_log(format!(
        "kline-watch started | {} | {} | press S to sample",
        first,
        rt.provider.name()
    ));

    let mut terminal = ratatui::init();
    let result = run(&mut terminal, &mut rt, &mut state, &mut app_rx);
    ratatui::restore();

    rt.sampler.stop();
    rt.scheduler.handle().cancel();
    tracing::info!(cycles = rt.scheduler.cycles(), "Shutdown complete");
    result
}
