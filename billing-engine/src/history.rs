use std::collections::BTreeMap;

use serde::Serialize;

use crate::{aggregate::PeriodBucket, calendar::YearMonth};

/// How far a month's actual value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// Metered span close enough to the calendar month.
    Measured,
    /// Has consumption, but the metered span deviates too far from the month.
    Unreliable,
    /// No valid reading at all.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: YearMonth,
    pub label: String,
    /// Actual consumption; `None` unless `quality` is `Measured`.
    pub actual_volume: Option<f64>,
    pub expected_volume: Option<f64>,
    pub quality: DataQuality,
}

impl TrendPoint {
    pub fn is_reliable(&self) -> bool {
        self.quality == DataQuality::Measured
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalSeries {
    pub points: Vec<TrendPoint>,
}

impl HistoricalSeries {
    pub fn reliable_months(&self) -> usize {
        self.points.iter().filter(|p| p.is_reliable()).count()
    }
}

/// Pair each monthly bucket with the expected consumption for its month number.
///
/// Unreliable and missing months keep their slot so the trend always has one
/// point per bucket.
pub fn build_series(
    monthly: &[PeriodBucket],
    expected_by_month: &BTreeMap<u8, f64>,
    max_bill_day_err: f64,
) -> HistoricalSeries {
    let points = monthly
        .iter()
        .map(|bucket| {
            let month = YearMonth::containing(bucket.start);
            let quality = classify(bucket, max_bill_day_err);
            TrendPoint {
                month,
                label: month.label(),
                actual_volume: match quality {
                    DataQuality::Measured => bucket.total_volume,
                    DataQuality::Unreliable | DataQuality::Missing => None,
                },
                expected_volume: expected_by_month.get(&month.number()).copied(),
                quality,
            }
        })
        .collect();

    HistoricalSeries { points }
}

fn classify(bucket: &PeriodBucket, max_bill_day_err: f64) -> DataQuality {
    if !bucket.has_data() {
        return DataQuality::Missing;
    }
    match bucket.duration_error() {
        Some(err) if err.abs() <= max_bill_day_err => DataQuality::Measured,
        _ => DataQuality::Unreliable,
    }
}
