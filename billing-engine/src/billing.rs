use serde::Serialize;
use time::OffsetDateTime;

use crate::{aggregate::PeriodBucket, calendar::YearMonth};

/// Billed consumption for one calendar month.
///
/// The billing period is the span actually covered by meter readings, which
/// rarely matches the calendar month exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingResult {
    pub period: YearMonth,
    pub has_data: bool,
    pub total_volume: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub period_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub period_end: Option<OffsetDateTime>,
}

impl BillingResult {
    /// No billable meter signal for `period`; downstream must not invoice.
    pub fn no_data(period: YearMonth) -> Self {
        Self {
            period,
            has_data: false,
            total_volume: None,
            period_start: None,
            period_end: None,
        }
    }
}

/// Pick the bucket for `target` out of the monthly series.
pub fn resolve(monthly: &[PeriodBucket], target: YearMonth) -> BillingResult {
    let Some(bucket) = monthly
        .iter()
        .find(|b| YearMonth::containing(b.start) == target)
    else {
        return BillingResult::no_data(target);
    };

    match bucket.total_volume {
        Some(total) => BillingResult {
            period: target,
            has_data: true,
            total_volume: Some(total),
            period_start: bucket.first_reading_ts,
            period_end: bucket.last_reading_ts,
        },
        None => BillingResult::no_data(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn uses_metered_span_not_calendar_month() {
        let mut bucket = PeriodBucket::empty(date!(2023-01-01), 31.0);
        bucket.total_volume = Some(12.5);
        bucket.first_reading_ts = Some(datetime!(2022-12-31 22:00 UTC));
        bucket.last_reading_ts = Some(datetime!(2023-01-31 23:00 UTC));

        let result = resolve(&[bucket], YearMonth::new(2023, 1).unwrap());
        assert!(result.has_data);
        assert_eq!(result.total_volume, Some(12.5));
        assert_eq!(result.period_start, Some(datetime!(2022-12-31 22:00 UTC)));
        assert_eq!(result.period_end, Some(datetime!(2023-01-31 23:00 UTC)));
    }

    #[test]
    fn bucket_with_only_resets_is_no_data() {
        let mut bucket = PeriodBucket::empty(date!(2023-01-01), 31.0);
        bucket.first_reading_ts = Some(datetime!(2023-01-02 00:00 UTC));
        bucket.last_reading_ts = Some(datetime!(2023-01-03 00:00 UTC));
        bucket.record_count = 1;
        bucket.reset_count = 1;

        let result = resolve(&[bucket], YearMonth::new(2023, 1).unwrap());
        assert_eq!(result, BillingResult::no_data(YearMonth::new(2023, 1).unwrap()));
    }

    #[test]
    fn missing_target_bucket_is_no_data() {
        let bucket = PeriodBucket::empty(date!(2023-01-01), 31.0);
        let result = resolve(&[bucket], YearMonth::new(2023, 2).unwrap());
        assert!(!result.has_data);
        assert_eq!(result.period_start, None);
        assert_eq!(result.period_end, None);
    }
}
