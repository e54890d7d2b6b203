//! Calendar bucketing of delta records.
//!
//! Both aggregators allocate every calendar slot up front and then make a
//! single pass over the records, so a period without readings still shows up
//! as an empty bucket instead of disappearing from the series.

pub mod daily;
pub mod monthly;

pub use daily::aggregate_days;
pub use monthly::{aggregate_months, HISTORY_MONTHS};

use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::transform::DeltaRecord;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Consumption and coverage for one calendar day or month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    /// First calendar day of the period.
    pub start: Date,
    /// Calendar length of the period in days.
    pub nominal_days: f64,
    /// Sum of valid record volumes; `None` when no valid record landed here.
    pub total_volume: Option<f64>,
    /// Earliest reading backing any record in the period.
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_reading_ts: Option<OffsetDateTime>,
    /// Latest reading of any record in the period.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_reading_ts: Option<OffsetDateTime>,
    pub record_count: usize,
    pub reset_count: usize,
}

impl PeriodBucket {
    pub fn empty(start: Date, nominal_days: f64) -> Self {
        Self {
            start,
            nominal_days,
            total_volume: None,
            first_reading_ts: None,
            last_reading_ts: None,
            record_count: 0,
            reset_count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.total_volume.is_some()
    }

    /// Days between the first and last reading backing this period.
    pub fn covered_days(&self) -> Option<f64> {
        match (self.first_reading_ts, self.last_reading_ts) {
            (Some(first), Some(last)) => Some((last - first).as_seconds_f64() / SECONDS_PER_DAY),
            _ => None,
        }
    }

    /// Covered span minus calendar length; negative when readings fall short.
    pub fn duration_error(&self) -> Option<f64> {
        self.covered_days().map(|covered| covered - self.nominal_days)
    }

    /// Whether the metered span lies within `[min_days, max_days]`.
    pub fn covered_within(&self, min_days: f64, max_days: f64) -> bool {
        self.covered_days()
            .is_some_and(|covered| covered >= min_days && covered <= max_days)
    }

    /// Fold one record into the bucket.
    ///
    /// Invalid records extend the reading span but add no volume.
    pub(crate) fn absorb(&mut self, record: &DeltaRecord) {
        self.record_count += 1;
        self.first_reading_ts = Some(match self.first_reading_ts {
            Some(first) => first.min(record.prior_ts),
            None => record.prior_ts,
        });
        self.last_reading_ts = Some(match self.last_reading_ts {
            Some(last) => last.max(record.ts),
            None => record.ts,
        });

        match record.volume() {
            Some(volume) => self.total_volume = Some(self.total_volume.unwrap_or(0.0) + volume),
            None => self.reset_count += 1,
        }
    }
}
