use chrono::{DateTime, Local};

/// One sampled price update. Consumed once by the update scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Local>,
    pub price: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub volume: u64,
    /// Time spent producing this tick, in microseconds.
    pub latency_us: u64,
}

impl Tick {
    /// Build a tick from a baseline close and a new price.
    pub fn from_baseline(
        timestamp: DateTime<Local>,
        last_close: f64,
        price: f64,
        volume: u64,
    ) -> Self {
        let change_amount = price - last_close;
        let change_percent = if last_close == 0.0 {
            0.0
        } else {
            change_amount / last_close * 100.0
        };
        Self {
            timestamp,
            price,
            change_amount,
            change_percent,
            volume,
            latency_us: 0,
        }
    }

    /// One-line summary used by the scrolling price log, e.g. `09:31:05 10.02 +0.20%`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} {:.2} {:+.2}%",
            self.timestamp.format("%H:%M:%S"),
            self.price,
            self.change_percent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn change_fields_follow_baseline() {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 9, 31, 5).unwrap();
        let tick = Tick::from_baseline(ts, 10.0, 10.05, 12_000);
        assert!((tick.change_amount - 0.05).abs() < 1e-9);
        assert!((tick.change_percent - 0.5).abs() < 1e-9);
        assert_eq!(tick.summary_line(), "09:31:05 10.05 +0.50%");
    }

    #[test]
    fn negative_change_is_signed() {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap();
        let tick = Tick::from_baseline(ts, 10.0, 9.95, 1);
        assert_eq!(tick.summary_line(), "14:00:00 9.95 -0.50%");
    }
}
