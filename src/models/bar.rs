use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ExtractError;

/// One trading day of OHLCV data.
///
/// Prices and volume are kept at two fractional digits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl DailyBar {
    pub fn new(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            date,
            open: open.round_dp(2),
            high: high.round_dp(2),
            low: low.round_dp(2),
            close: close.round_dp(2),
            volume: volume.round_dp(2),
        }
    }
}

/// Bars kept sorted by date with at most one bar per day.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSeries {
    bars: Vec<DailyBar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a bar at its sorted position. A bar for an already
    /// covered date is dropped and `false` returned.
    pub fn insert(&mut self, bar: DailyBar) -> bool {
        match self.bars.binary_search_by(|probe| probe.date.cmp(&bar.date)) {
            Ok(_) => false,
            Err(pos) => {
                self.bars.insert(pos, bar);
                true
            }
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyBar> {
        self.bars
            .binary_search_by(|probe| probe.date.cmp(&date))
            .ok()
            .map(|pos| &self.bars[pos])
    }

    pub fn first(&self) -> Option<&DailyBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&DailyBar> {
        self.bars.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DailyBar> {
        self.bars.iter()
    }

    pub fn as_slice(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    /// Parses semicolon-separated daily values.
    ///
    /// The first line is a header and is discarded. Every following
    /// non-empty line must hold exactly
    /// `date;open;high;low;close;volume` with the date as
    /// `YYYY-MM-DD`. The first malformed row aborts with
    /// [`ExtractError::ParsingFailed`].
    pub fn parse_csv(text: &str) -> Result<Self, ExtractError> {
        let mut series = Self::new();
        for (index, line) in text.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() != 6 {
                return Err(ExtractError::ParsingFailed(format!(
                    "daily values row {index}: expected 6 fields, got {}",
                    fields.len()
                )));
            }
            let date = NaiveDate::parse_from_str(fields[0].trim(), "%Y-%m-%d").map_err(|e| {
                ExtractError::ParsingFailed(format!("daily values row {index}: bad date: {e}"))
            })?;
            let mut values = [Decimal::ZERO; 5];
            for (slot, field) in values.iter_mut().zip(&fields[1..]) {
                *slot = Decimal::from_str(field.trim()).map_err(|e| {
                    ExtractError::ParsingFailed(format!(
                        "daily values row {index}: bad number '{}': {e}",
                        field.trim()
                    ))
                })?;
            }
            series.insert(DailyBar::new(
                date, values[0], values[1], values[2], values[3], values[4],
            ));
        }
        Ok(series)
    }
}
