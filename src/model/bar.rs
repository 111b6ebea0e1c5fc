use chrono::NaiveDate;

use crate::error::RenderError;

/// One daily OHLCV record as delivered by a market-data provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Close at or above open. A flat bar counts as up.
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Intraday change relative to the open, in percent, rounded to 2 decimals.
    pub fn change_pct(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        (((self.close - self.open) / self.open) * 10_000.0).round() / 100.0
    }

    /// High-low range relative to the open, in percent.
    pub fn amplitude_pct(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        (self.high - self.low) / self.open * 100.0
    }

    /// Check the OHLC ordering `low <= min(open, close) <= max(open, close) <= high`
    /// and that every price is a finite positive number.
    pub fn validate(&self) -> Result<(), RenderError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(RenderError::NonFinitePrice { date: self.date });
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(RenderError::NonPositivePrice { date: self.date });
        }
        if self.low > self.body_low() || self.body_high() > self.high {
            return Err(RenderError::OhlcOrder { date: self.date });
        }
        Ok(())
    }
}
