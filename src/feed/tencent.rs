use std::time::Duration;

use chrono::NaiveDate;

use super::types::{KlineResponse, KlineSeries};
use super::MarketDataProvider;
use crate::config::FeedConfig;
use crate::error::FetchError;
use crate::model::bar::Bar;
use crate::model::instrument::{market_symbol, InstrumentInfo};

/// Most recent daily rows requested per history call.
const HISTORY_LIMIT: usize = 320;

/// Daily history and quotes from the public Tencent endpoints.
#[derive(Debug)]
pub struct TencentProvider {
    http: reqwest::Client,
    kline_base_url: String,
    quote_base_url: String,
    retry_times: u32,
    retry_delay: Duration,
}

impl TencentProvider {
    pub fn from_config(cfg: &FeedConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            http,
            kline_base_url: cfg.kline_base_url.trim_end_matches('/').to_string(),
            quote_base_url: cfg.quote_base_url.trim_end_matches('/').to_string(),
            retry_times: cfg.retry_times.max(1),
            retry_delay: cfg.retry_delay(),
        })
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        let mut last_err = FetchError::Network("no attempt made".to_string());
        for attempt in 1..=self.retry_times {
            let result = async {
                let resp = self
                    .http
                    .get(url)
                    .query(query)
                    .send()
                    .await?
                    .error_for_status()?;
                resp.text().await
            }
            .await;
            match result {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!(url, attempt, error = %e, "Request failed");
                    last_err = e.into();
                    if matches!(last_err, FetchError::NotFound(_)) {
                        break;
                    }
                    if attempt < self.retry_times {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err)
    }
}

impl MarketDataProvider for TencentProvider {
    async fn fetch_history(&self, instrument: &str) -> Result<Vec<Bar>, FetchError> {
        let symbol = market_symbol(instrument);
        let url = format!("{}/appstock/app/fqkline/get", self.kline_base_url);
        let param = format!("{},day,,,{},qfq", symbol, HISTORY_LIMIT);
        let body = self.get_text(&url, &[("param", param)]).await?;
        parse_kline_response(&symbol, &body)
    }

    async fn fetch_info(&self, instrument: &str) -> Result<InstrumentInfo, FetchError> {
        let symbol = market_symbol(instrument);
        let url = format!("{}/q={}", self.quote_base_url, symbol);
        let body = self.get_text(&url, &[]).await?;
        parse_quote_response(instrument, &symbol, &body)
    }
}

fn value_f64(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse one `[date, open, close, high, low, volume, ...]` row.
fn parse_row(row: &[serde_json::Value]) -> Option<Bar> {
    let date = NaiveDate::parse_from_str(row.first()?.as_str()?, "%Y-%m-%d").ok()?;
    let open = value_f64(row.get(1)?)?;
    let close = value_f64(row.get(2)?)?;
    let high = value_f64(row.get(3)?)?;
    let low = value_f64(row.get(4)?)?;
    let volume = value_f64(row.get(5)?)?;
    if !(volume.is_finite() && volume >= 0.0) {
        return None;
    }
    Some(Bar::new(date, open, high, low, close, volume as u64))
}

/// Decode a `fqkline/get` body. Rows that fail to parse are skipped; a
/// symbol with no rows at all is reported as not found.
pub fn parse_kline_response(symbol: &str, body: &str) -> Result<Vec<Bar>, FetchError> {
    let resp: KlineResponse = serde_json::from_str(body)?;
    if resp.code != 0 {
        return Err(FetchError::Parse(format!(
            "kline endpoint returned code {}: {}",
            resp.code, resp.msg
        )));
    }
    let series = match resp.data.get(symbol) {
        Some(v) => serde_json::from_value::<KlineSeries>(v.clone())?,
        None => return Err(FetchError::NotFound(symbol.to_string())),
    };
    let rows = series.rows();
    let start = rows.len().saturating_sub(HISTORY_LIMIT);
    let mut bars = Vec::with_capacity(rows.len() - start);
    let mut skipped = 0usize;
    for row in &rows[start..] {
        match parse_row(row) {
            Some(bar) => bars.push(bar),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(symbol, skipped, "Skipped unparseable kline rows");
    }
    if bars.is_empty() {
        return Err(FetchError::NotFound(symbol.to_string()));
    }
    Ok(bars)
}

/// Decode a `q=` quote body: `v_sh601127="1~NAME~601127~12.34~...";`.
pub fn parse_quote_response(code: &str, symbol: &str, body: &str) -> Result<InstrumentInfo, FetchError> {
    let marker = format!("v_{}", symbol);
    if !body.contains(&marker) {
        return Err(FetchError::NotFound(symbol.to_string()));
    }
    let (start, end) = match (body.find('"'), body.rfind('"')) {
        (Some(s), Some(e)) if e > s => (s + 1, e),
        _ => return Err(FetchError::Parse("quote body is not quoted".to_string())),
    };
    let parts: Vec<&str> = body[start..end].split('~').collect();
    if parts.len() <= 5 {
        return Err(FetchError::NotFound(symbol.to_string()));
    }
    let field = |i: usize| parts.get(i).and_then(|s| s.trim().parse::<f64>().ok());
    Ok(InstrumentInfo {
        code: code.trim().to_string(),
        display_name: parts[1].trim().to_string(),
        last_price: field(3),
        change_pct: field(32),
        float_cap_e8: field(44),
        total_cap_e8: field(45),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_row_reads_tencent_order() {
        let row: Vec<serde_json::Value> =
            serde_json::from_str(r#"["2024-03-01","10.00","10.50","11.00","9.00","12345.000"]"#)
                .unwrap();
        let bar = parse_row(&row).unwrap();
        assert!((bar.open - 10.0).abs() < f64::EPSILON);
        assert!((bar.close - 10.5).abs() < f64::EPSILON);
        assert!((bar.high - 11.0).abs() < f64::EPSILON);
        assert!((bar.low - 9.0).abs() < f64::EPSILON);
        assert_eq!(bar.volume, 12_345);
    }

    #[test]
    fn parse_row_rejects_short_rows() {
        let row: Vec<serde_json::Value> =
            serde_json::from_str(r#"["2024-03-01","10.00","10.50"]"#).unwrap();
        assert!(parse_row(&row).is_none());
    }
}
