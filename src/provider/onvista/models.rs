use serde::Deserialize;

/// Realtime quote payload. Only the fields we normalize are modeled,
/// everything else in the payload is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeQuote {
    pub price: Option<f64>,
    pub previous_last: Option<f64>,
    pub iso_currency: Option<String>,
    pub datetime_price: Option<PriceTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTime {
    pub local_time: Option<String>,
}

/// History payload of parallel arrays, one slot per trading day.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySeries {
    #[serde(default)]
    pub datetime_last: Vec<i64>,
    #[serde(default)]
    pub first: Vec<f64>,
    #[serde(default)]
    pub last: Vec<f64>,
    #[serde(default)]
    pub high: Vec<f64>,
    #[serde(default)]
    pub low: Vec<f64>,
    #[serde(default)]
    pub volume: Vec<f64>,
}
