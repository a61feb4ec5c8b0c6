//! Normalizes Yahoo Finance quote and chart payloads.

mod models;

use tracing::debug;

use crate::errors::ExtractError;
use crate::models::bar::DailyBar;
use crate::provider::{
    date_from_epoch, datetime_from_epoch, decimal_from, fact, Fact, FACT_CURRENCY, FACT_LAST_DATE,
    FACT_LAST_TIME, FACT_PRICE, FACT_PRICE_BEFORE,
};

use models::{ChartResponse, RealtimeResponse};

/// Extracts the five realtime facts from a quote payload.
pub fn realtime_facts(payload: &str) -> Result<Vec<Fact>, ExtractError> {
    let response: RealtimeResponse = serde_json::from_str(payload)?;
    let result = response
        .quote_response
        .and_then(|q| q.result)
        .and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.swap_remove(0))
            }
        })
        .ok_or(ExtractError::NoContent)?;

    let currency = result
        .currency
        .ok_or_else(|| ExtractError::Internal("quote is missing currency".to_string()))?;
    let market_time = result
        .regular_market_time
        .ok_or_else(|| ExtractError::Internal("quote is missing regularMarketTime".to_string()))?;
    let price = result
        .regular_market_price
        .ok_or_else(|| ExtractError::Internal("quote is missing regularMarketPrice".to_string()))?;
    let previous = result.regular_market_previous_close.ok_or_else(|| {
        ExtractError::Internal("quote is missing regularMarketPreviousClose".to_string())
    })?;

    let stamp = datetime_from_epoch(market_time)?;
    debug!(price, currency = %currency, "normalized yahoo realtime quote");

    Ok(vec![
        fact(FACT_CURRENCY, currency),
        fact(FACT_LAST_DATE, stamp.format("%Y-%m-%d").to_string()),
        fact(FACT_LAST_TIME, stamp.format("%H:%M:%S").to_string()),
        fact(FACT_PRICE, decimal_from(price)?.to_string()),
        fact(FACT_PRICE_BEFORE, decimal_from(previous)?.to_string()),
    ])
}

/// Converts a chart payload into one row per timestamp.
///
/// A row whose OHLCV slots are not all present comes back as `None`
/// and is skipped by the caller without failing the run.
pub fn history_bars(payload: &str) -> Result<Vec<Option<DailyBar>>, ExtractError> {
    let response: ChartResponse = serde_json::from_str(payload)?;
    let result = response
        .chart
        .and_then(|c| c.result)
        .and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.swap_remove(0))
            }
        })
        .ok_or(ExtractError::NoContent)?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result
        .indicators
        .and_then(|i| i.quote)
        .and_then(|mut quotes| {
            if quotes.is_empty() {
                None
            } else {
                Some(quotes.swap_remove(0))
            }
        });
    let (Some(quote), false) = (quote, timestamps.is_empty()) else {
        return Err(ExtractError::NoContent);
    };

    let rows = timestamps.len();
    let column = |name: &str, values: Option<Vec<Option<f64>>>| {
        let values = values.ok_or_else(|| {
            ExtractError::ParsingFailed(format!("chart is missing the {name} column"))
        })?;
        if values.len() != rows {
            return Err(ExtractError::ParsingFailed(format!(
                "chart {name} column does not cover every timestamp"
            )));
        }
        Ok(values)
    };
    let open = column("open", quote.open)?;
    let close = column("close", quote.close)?;
    let high = column("high", quote.high)?;
    let low = column("low", quote.low)?;
    let volume = column("volume", quote.volume)?;

    let mut bars = Vec::with_capacity(rows);
    let mut skipped = 0usize;
    for i in 0..rows {
        match (open[i], close[i], high[i], low[i], volume[i]) {
            (Some(o), Some(c), Some(h), Some(l), Some(v)) => {
                bars.push(Some(DailyBar::new(
                    date_from_epoch(timestamps[i])?,
                    decimal_from(o)?,
                    decimal_from(h)?,
                    decimal_from(l)?,
                    decimal_from(c)?,
                    decimal_from(v)?,
                )));
            }
            _ => {
                skipped += 1;
                bars.push(None);
            }
        }
    }
    debug!(rows, skipped, "normalized yahoo chart payload");
    Ok(bars)
}
