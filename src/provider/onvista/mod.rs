//! Normalizes OnVista realtime and history payloads.

mod models;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::errors::ExtractError;
use crate::models::bar::DailyBar;
use crate::provider::{
    date_from_epoch, decimal_from, fact, Fact, FACT_CURRENCY, FACT_LAST_DATE, FACT_LAST_TIME,
    FACT_PRICE, FACT_PRICE_BEFORE,
};

use models::{HistorySeries, RealtimeQuote};

/// Extracts the five realtime facts from a quote payload.
pub fn realtime_facts(payload: &str) -> Result<Vec<Fact>, ExtractError> {
    let quote: RealtimeQuote = serde_json::from_str(payload)?;

    let currency = quote
        .iso_currency
        .ok_or_else(|| ExtractError::Internal("quote is missing isoCurrency".to_string()))?;
    let local_time = quote
        .datetime_price
        .and_then(|stamp| stamp.local_time)
        .ok_or_else(|| {
            ExtractError::Internal("quote is missing datetimePrice.localTime".to_string())
        })?;
    let price = quote
        .price
        .ok_or_else(|| ExtractError::Internal("quote is missing price".to_string()))?;
    let previous = quote
        .previous_last
        .ok_or_else(|| ExtractError::Internal("quote is missing previousLast".to_string()))?;

    let stamp = parse_local_time(&local_time)?;
    debug!(price, currency = %currency, "normalized onvista realtime quote");

    Ok(vec![
        fact(FACT_CURRENCY, currency),
        fact(FACT_LAST_DATE, stamp.format("%Y-%m-%d").to_string()),
        fact(FACT_LAST_TIME, stamp.format("%H:%M:%S").to_string()),
        fact(FACT_PRICE, decimal_from(price)?.to_string()),
        fact(FACT_PRICE_BEFORE, decimal_from(previous)?.to_string()),
    ])
}

/// Converts the parallel history arrays into one bar per slot.
///
/// Every returned row is `Some`; the `Option` is shared with providers
/// whose payloads can hold null rows.
pub fn history_bars(payload: &str) -> Result<Vec<Option<DailyBar>>, ExtractError> {
    let series: HistorySeries = serde_json::from_str(payload)?;

    // an empty open column means the payload carries no trading days at
    // all; anything else missing is a malformed payload
    if series.first.is_empty() {
        return Err(ExtractError::NoContent);
    }
    let rows = series.datetime_last.len();
    if rows == 0
        || series.first.len() != rows
        || series.last.len() != rows
        || series.high.len() != rows
        || series.low.len() != rows
        || series.volume.len() != rows
    {
        return Err(ExtractError::ParsingFailed(
            "history arrays differ in length".to_string(),
        ));
    }

    let mut bars = Vec::with_capacity(rows);
    for i in 0..rows {
        bars.push(Some(DailyBar::new(
            date_from_epoch(series.datetime_last[i])?,
            decimal_from(series.first[i])?,
            decimal_from(series.high[i])?,
            decimal_from(series.low[i])?,
            decimal_from(series.last[i])?,
            decimal_from(series.volume[i])?,
        )));
    }
    debug!(rows, "normalized onvista history payload");
    Ok(bars)
}

/// The timestamp arrives either RFC 3339 or as a bare local stamp.
fn parse_local_time(raw: &str) -> Result<NaiveDateTime, ExtractError> {
    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(stamp.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(stamp);
        }
    }
    Err(ExtractError::Internal(format!(
        "unparseable quote timestamp '{raw}'"
    )))
}
