use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sampling periods offered in the UI, in seconds.
pub const ALLOWED_PERIODS_SECS: [u64; 7] = [1, 3, 5, 10, 15, 30, 60];
pub const ALLOWED_WINDOWS: [usize; 2] = [30, 50];
pub const ALLOWED_STREAM_CAPACITIES: [usize; 2] = [20, 50];

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub sampling: SamplingConfig,
    pub chart: ChartConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Tencent,
    Synthetic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub provider: ProviderKind,
    pub kline_base_url: String,
    pub quote_base_url: String,
    pub instrument: String,
    #[serde(default)]
    pub watchlist: Vec<String>,
    pub request_timeout_secs: u64,
    pub retry_times: u32,
    pub retry_delay_ms: u64,
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub period_secs: u64,
    /// Largest relative move per tick, e.g. 0.005 for +/-0.5%.
    pub max_change: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    pub window: usize,
    pub target_labels: usize,
    pub doji_epsilon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub refresh_rate_ms: u64,
    pub stream_capacity: usize,
    pub overlay_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Step to the neighbouring allowed sampling period. `forward` moves to the
/// next longer period. Unknown values snap to the closest allowed one.
pub fn cycle_period(current_secs: u64, forward: bool) -> u64 {
    let idx = ALLOWED_PERIODS_SECS
        .iter()
        .position(|p| *p >= current_secs)
        .unwrap_or(ALLOWED_PERIODS_SECS.len() - 1);
    let next = if forward {
        (idx + 1).min(ALLOWED_PERIODS_SECS.len() - 1)
    } else {
        idx.saturating_sub(1)
    };
    ALLOWED_PERIODS_SECS[next]
}

/// Toggle between the two supported chart windows.
pub fn toggle_window(current: usize) -> usize {
    if current == ALLOWED_WINDOWS[0] {
        ALLOWED_WINDOWS[1]
    } else {
        ALLOWED_WINDOWS[0]
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Primary instrument first, then the watchlist, deduplicated.
    pub fn instruments(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.instrument.trim().is_empty() {
            out.push(self.instrument.trim().to_string());
        }
        for code in &self.watchlist {
            let c = code.trim().to_string();
            if !c.is_empty() && !out.iter().any(|v| v == &c) {
                out.push(c);
            }
        }
        out
    }
}

impl SamplingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl UiConfig {
    pub fn refresh_rate(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("KLINE_WATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !ALLOWED_PERIODS_SECS.contains(&self.sampling.period_secs) {
            bail!(
                "sampling.period_secs = {} is not one of {:?}",
                self.sampling.period_secs,
                ALLOWED_PERIODS_SECS
            );
        }
        if !(self.sampling.max_change > 0.0 && self.sampling.max_change <= 0.01) {
            bail!(
                "sampling.max_change = {} must be in (0, 0.01]",
                self.sampling.max_change
            );
        }
        if !ALLOWED_WINDOWS.contains(&self.chart.window) {
            bail!(
                "chart.window = {} is not one of {:?}",
                self.chart.window,
                ALLOWED_WINDOWS
            );
        }
        if self.chart.target_labels == 0 {
            bail!("chart.target_labels must be > 0");
        }
        if !ALLOWED_STREAM_CAPACITIES.contains(&self.ui.stream_capacity) {
            bail!(
                "ui.stream_capacity = {} is not one of {:?}",
                self.ui.stream_capacity,
                ALLOWED_STREAM_CAPACITIES
            );
        }
        if self.ui.refresh_rate_ms == 0 {
            bail!("ui.refresh_rate_ms must be > 0");
        }
        if self.feed.instruments().is_empty() {
            bail!("feed.instrument is empty");
        }
        Ok(())
    }
}
