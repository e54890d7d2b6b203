use time::{Duration, UtcOffset};

use super::PeriodBucket;
use crate::{calendar::YearMonth, transform::DeltaRecord};

/// Bucket records into the calendar days of `target`.
///
/// One bucket per day of the month, in order. Only records whose `ts` falls
/// inside `target` (at `offset`) contribute.
pub fn aggregate_days(records: &[DeltaRecord], target: YearMonth, offset: UtcOffset) -> Vec<PeriodBucket> {
    let first_day = target.first_day();
    let mut slots: Vec<PeriodBucket> = (0..target.days())
        .map(|d| PeriodBucket::empty(first_day + Duration::days(i64::from(d)), 1.0))
        .collect();

    for record in records {
        let date = record.ts.to_offset(offset).date();
        if YearMonth::containing(date) != target {
            continue;
        }
        if let Some(slot) = slots.get_mut(usize::from(date.day()) - 1) {
            slot.absorb(record);
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::RawSample;
    use time::macros::{date, datetime, offset};

    use crate::transform::{normalize, units::FuelConversion};

    #[test]
    fn one_slot_per_calendar_day() {
        for (year, month, days) in [(2024, 2, 29), (2023, 2, 28), (2023, 4, 30), (2023, 1, 31)] {
            let target = YearMonth::new(year, month).unwrap();
            let buckets = aggregate_days(&[], target, UtcOffset::UTC);
            assert_eq!(buckets.len(), days);
            assert_eq!(buckets[0].start, target.first_day());
            assert!(buckets.iter().all(|b| b.nominal_days == 1.0 && !b.has_data()));
        }
    }

    #[test]
    fn hourly_readings_cover_whole_days() {
        let start = datetime!(2023-03-01 00:00 UTC);
        let samples: Vec<RawSample> = (0..=(31 * 24))
            .map(|h| RawSample::new(start + Duration::hours(h), h as f64 * 10.0))
            .collect();
        let records = normalize(&samples, 1.0, &FuelConversion::default());
        let buckets = aggregate_days(&records, YearMonth::new(2023, 3).unwrap(), UtcOffset::UTC);

        assert_eq!(buckets.len(), 31);
        // First day starts at the first reading, so it is one hour short.
        assert!((buckets[0].covered_days().unwrap() - 23.0 / 24.0).abs() < 1e-9);
        for day in &buckets[1..] {
            assert!((day.covered_days().unwrap() - 1.0).abs() < 1e-9, "{:?}", day.start);
            assert!(day.covered_within(0.75, 1.25));
        }
    }

    #[test]
    fn half_day_span_is_outside_tolerance() {
        let samples = [
            RawSample::new(datetime!(2023-03-10 06:00 UTC), 1000.0),
            RawSample::new(datetime!(2023-03-10 18:00 UTC), 1100.0),
        ];
        let records = normalize(&samples, 1.0, &FuelConversion::default());
        let buckets = aggregate_days(&records, YearMonth::new(2023, 3).unwrap(), UtcOffset::UTC);

        let day = &buckets[9];
        assert_eq!(day.start, date!(2023-03-10));
        assert!(day.has_data());
        assert_eq!(day.covered_days(), Some(0.5));
        assert!(!day.covered_within(0.75, 1.25));
    }

    fn day_spanning(seconds: i64) -> PeriodBucket {
        let ts = datetime!(2023-03-10 23:00 UTC);
        let record = DeltaRecord {
            ts,
            prior_ts: ts - Duration::seconds(seconds),
            delta_energy: 100.0,
            delta_volume: 1.0,
        };
        aggregate_days(&[record], YearMonth::new(2023, 3).unwrap(), UtcOffset::UTC).swap_remove(9)
    }

    #[test]
    fn tolerance_band_edges_are_inclusive() {
        let low = day_spanning(18 * 3600);
        assert_eq!(low.covered_days(), Some(0.75));
        assert!(low.covered_within(0.75, 1.25));

        let high = day_spanning(30 * 3600);
        assert_eq!(high.covered_days(), Some(1.25));
        assert!(high.covered_within(0.75, 1.25));

        // 1.2501 days
        let over = day_spanning(108_009);
        assert!(over.covered_days().unwrap() > 1.2501);
        assert!(!over.covered_within(0.75, 1.25));
    }

    #[test]
    fn offset_moves_readings_between_days() {
        let samples = [
            RawSample::new(datetime!(2023-03-10 12:00 UTC), 0.0),
            RawSample::new(datetime!(2023-03-11 05:00 UTC), 10.0),
        ];
        let records = normalize(&samples, 1.0, &FuelConversion::default());
        let buckets = aggregate_days(&records, YearMonth::new(2023, 3).unwrap(), offset!(-9));

        assert!(buckets[9].has_data());
        assert!(!buckets[10].has_data());
    }
}
