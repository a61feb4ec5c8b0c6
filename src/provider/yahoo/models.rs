//! Yahoo Finance API response models.
//!
//! Only the fields the normalizers read are modeled; everything else
//! in the payloads is ignored.

use serde::Deserialize;

/// Envelope of the realtime quote endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeResponse {
    pub quote_response: Option<QuoteResponse>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteResponse {
    #[serde(default)]
    pub result: Option<Vec<QuoteResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResult {
    pub currency: Option<String>,
    pub regular_market_time: Option<i64>,
    pub regular_market_price: Option<f64>,
    pub regular_market_previous_close: Option<f64>,
}

/// Envelope of the chart (history) endpoint.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Option<Chart>,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub timestamp: Option<Vec<i64>>,
    pub indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Option<Vec<QuoteArrays>>,
}

/// OHLCV columns, each slot individually nullable.
#[derive(Debug, Deserialize)]
pub struct QuoteArrays {
    pub open: Option<Vec<Option<f64>>>,
    pub close: Option<Vec<Option<f64>>>,
    pub high: Option<Vec<Option<f64>>>,
    pub low: Option<Vec<Option<f64>>>,
    pub volume: Option<Vec<Option<f64>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_quote_result() {
        let json = r#"{
            "currency": "EUR",
            "regularMarketTime": 1709310902,
            "regularMarketPrice": 181.37,
            "regularMarketPreviousClose": 180.0,
            "shortName": "SAP SE"
        }"#;
        let result: QuoteResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.currency, Some("EUR".to_string()));
        assert_eq!(result.regular_market_time, Some(1709310902));
        assert_eq!(result.regular_market_price, Some(181.37));
        assert_eq!(result.regular_market_previous_close, Some(180.0));
    }

    #[test]
    fn test_deserialize_null_chart_result() {
        let json = r#"{"chart": {"result": null, "error": {"code": "Not Found"}}}"#;
        let response: ChartResponse = serde_json::from_str(json).unwrap();
        assert!(response.chart.unwrap().result.is_none());
    }

    #[test]
    fn test_deserialize_nullable_column_slots() {
        let json = r#"{
            "open": [1.0, null, 3.0],
            "close": [1.5, null, 3.5],
            "high": null,
            "low": [0.5, null, 2.5],
            "volume": [10, null, 30]
        }"#;
        let arrays: QuoteArrays = serde_json::from_str(json).unwrap();
        assert_eq!(arrays.open.as_ref().unwrap()[1], None);
        assert_eq!(arrays.open.as_ref().unwrap()[2], Some(3.0));
        assert!(arrays.high.is_none());
    }
}
