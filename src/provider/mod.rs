//! Provider-specific payload normalization.
//!
//! Each provider module turns a raw JSON payload into either the five
//! realtime facts or a row-per-day history, sharing the conversion
//! helpers defined here.

pub mod onvista;
pub mod yahoo;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

use crate::errors::ExtractError;

/// Realtime fact names, published in this order.
pub const FACT_CURRENCY: &str = "Currency";
pub const FACT_LAST_DATE: &str = "LastDate";
pub const FACT_LAST_TIME: &str = "LastTime";
pub const FACT_PRICE: &str = "Price";
pub const FACT_PRICE_BEFORE: &str = "PriceBefore";

/// One named realtime value.
pub type Fact = (&'static str, String);

pub(crate) fn fact(name: &'static str, value: String) -> Fact {
    (name, value)
}

pub(crate) fn decimal_from(value: f64) -> Result<Decimal, ExtractError> {
    Decimal::from_f64(value)
        .ok_or_else(|| ExtractError::Internal(format!("value {value} is not representable")))
}

pub(crate) fn datetime_from_epoch(secs: i64) -> Result<DateTime<Utc>, ExtractError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ExtractError::Internal(format!("timestamp {secs} is out of range")))
}

pub(crate) fn date_from_epoch(secs: i64) -> Result<NaiveDate, ExtractError> {
    datetime_from_epoch(secs).map(|stamp| stamp.date_naive())
}
