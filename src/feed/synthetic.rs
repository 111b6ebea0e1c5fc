use chrono::{Datelike, Days, Local, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::MarketDataProvider;
use crate::error::FetchError;
use crate::model::bar::Bar;
use crate::model::instrument::InstrumentInfo;

/// Offline provider producing a reproducible daily random walk per code.
/// Used for demo mode and tests.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    pub seed: u64,
    pub days: usize,
    pub start_price: f64,
    pub end_date: Option<NaiveDate>,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            seed: 7,
            days: 120,
            start_price: 20.0,
            end_date: None,
        }
    }
}

impl SyntheticProvider {
    fn code_seed(&self, instrument: &str) -> u64 {
        instrument
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
    }

    /// Weekday bars ending at `end_date` (today when unset), oldest first.
    pub fn generate(&self, instrument: &str) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(self.code_seed(instrument));
        let end = self.end_date.unwrap_or_else(|| Local::now().date_naive());

        let mut dates = Vec::with_capacity(self.days);
        let mut d = end;
        while dates.len() < self.days {
            if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(d);
            }
            d = match d.checked_sub_days(Days::new(1)) {
                Some(prev) => prev,
                None => break,
            };
        }
        dates.reverse();

        let mut close = self.start_price;
        dates
            .into_iter()
            .map(|date| {
                let open = close;
                close = (open * (1.0 + rng.random_range(-0.03..=0.03))).max(0.01);
                let high = open.max(close) * (1.0 + rng.random_range(0.0..0.015));
                let low = open.min(close) * (1.0 - rng.random_range(0.0..0.015));
                let volume = rng.random_range(50_000..500_000);
                Bar::new(date, open, high, low, close, volume)
            })
            .collect()
    }
}

impl MarketDataProvider for SyntheticProvider {
    async fn fetch_history(&self, instrument: &str) -> Result<Vec<Bar>, FetchError> {
        if instrument.trim().is_empty() {
            return Err(FetchError::NotFound(instrument.to_string()));
        }
        Ok(self.generate(instrument.trim()))
    }

    async fn fetch_info(&self, instrument: &str) -> Result<InstrumentInfo, FetchError> {
        let bars = self.generate(instrument.trim());
        let last = bars.last();
        Ok(InstrumentInfo {
            code: instrument.trim().to_string(),
            display_name: format!("SIM {}", instrument.trim()),
            last_price: last.map(|b| b.close),
            change_pct: last.map(|b| b.change_pct()),
            total_cap_e8: None,
            float_cap_e8: None,
        })
    }
}
