use serde::Deserialize;

/// Envelope of the `fqkline/get` endpoint. `data` is keyed by market symbol;
/// its shape varies for unknown symbols, so it is kept as raw JSON.
#[derive(Debug, Deserialize)]
pub struct KlineResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Daily rows for one symbol: `[date, open, close, high, low, volume, ...]`.
/// `qfqday` holds forward-adjusted prices and is preferred over `day`.
#[derive(Debug, Default, Deserialize)]
pub struct KlineSeries {
    #[serde(default)]
    pub qfqday: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub day: Vec<Vec<serde_json::Value>>,
}

impl KlineSeries {
    pub fn rows(&self) -> &[Vec<serde_json::Value>] {
        if self.qfqday.is_empty() {
            &self.day
        } else {
            &self.qfqday
        }
    }
}
