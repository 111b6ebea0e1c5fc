/// Static quote metadata for the watched instrument.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstrumentInfo {
    pub code: String,
    pub display_name: String,
    pub last_price: Option<f64>,
    pub change_pct: Option<f64>,
    /// Total market capitalisation, in units of 100 million.
    pub total_cap_e8: Option<f64>,
    /// Free-float market capitalisation, in units of 100 million.
    pub float_cap_e8: Option<f64>,
}

/// Exchange prefix used by the quote endpoints: Shanghai codes start with `6`.
pub fn market_symbol(code: &str) -> String {
    let code = code.trim();
    let prefix = if code.starts_with('6') { "sh" } else { "sz" };
    format!("{}{}", prefix, code)
}
