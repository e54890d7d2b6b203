pub mod units;

use meter_client::domain::RawSample;
use serde::Serialize;
use time::OffsetDateTime;

use self::units::FuelConversion;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Consumption between two adjacent counter samples.
///
/// A record whose `delta_energy` is negative (counter reset, rollover or meter
/// swap) or NaN is invalid: it never contributes to a consumption total, but
/// its two timestamps are still real meter readings and count for coverage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub prior_ts: OffsetDateTime,
    pub delta_energy: f64,
    pub delta_volume: f64,
}

impl DeltaRecord {
    pub fn is_valid(&self) -> bool {
        self.delta_energy >= 0.0
    }

    /// Fuel volume this record contributes to totals.
    pub fn volume(&self) -> Option<f64> {
        self.is_valid().then_some(self.delta_volume)
    }

    pub fn span_days(&self) -> f64 {
        (self.ts - self.prior_ts).as_seconds_f64() / SECONDS_PER_DAY
    }
}

/// Turn an ordered cumulative counter series into per-interval deltas.
///
/// `samples` must be ascending and free of duplicate timestamps, as returned
/// by a [`crate::sources::ReadingSource`]. The first sample only anchors the
/// next delta, so `n` samples produce `n - 1` records.
pub fn normalize(samples: &[RawSample], unit_multiplier: f64, fuel: &FuelConversion) -> Vec<DeltaRecord> {
    let records: Vec<DeltaRecord> = samples
        .windows(2)
        .map(|pair| {
            let (prev, cur) = (pair[0], pair[1]);
            let delta_energy = (cur.value - prev.value) * unit_multiplier;
            DeltaRecord {
                ts: cur.ts,
                prior_ts: prev.ts,
                delta_energy,
                delta_volume: fuel.volume(delta_energy),
            }
        })
        .collect();

    let resets = records.iter().filter(|r| !r.is_valid()).count();
    if resets > 0 {
        metrics::counter!("delta_resets_total").increment(resets as u64);
        tracing::debug!(resets, records = records.len(), "counter resets excluded from totals");
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn fuel() -> FuelConversion {
        FuelConversion {
            energy_content: 100_000.0,
            efficiency: 0.8,
        }
    }

    #[test]
    fn fewer_than_two_samples_yield_nothing() {
        assert!(normalize(&[], 1.0, &fuel()).is_empty());
        let one = [RawSample::new(datetime!(2023-01-01 00:00 UTC), 1000.0)];
        assert!(normalize(&one, 1.0, &fuel()).is_empty());
    }

    #[test]
    fn counter_reset_is_invalid_not_clamped() {
        let samples = [
            RawSample::new(datetime!(2023-01-01 00:00 UTC), 1000.0),
            RawSample::new(datetime!(2023-01-15 00:00 UTC), 1500.0),
            RawSample::new(datetime!(2023-01-16 00:00 UTC), 200.0),
            RawSample::new(datetime!(2023-02-01 00:00 UTC), 700.0),
        ];
        let records = normalize(&samples, 1.0, &fuel());
        assert_eq!(records.len(), 3);

        assert!(records[0].is_valid());
        assert_eq!(records[0].delta_energy, 500.0);
        assert!((records[0].delta_volume - 0.00625).abs() < 1e-12);

        assert!(!records[1].is_valid());
        assert_eq!(records[1].delta_energy, -1300.0);
        assert_eq!(records[1].volume(), None);
        assert_eq!(records[1].prior_ts, datetime!(2023-01-15 00:00 UTC));
        assert_eq!(records[1].ts, datetime!(2023-01-16 00:00 UTC));

        assert!(records[2].is_valid());
        assert_eq!(records[2].delta_energy, 500.0);
    }

    #[test]
    fn multiplier_scales_energy() {
        let samples = [
            RawSample::new(datetime!(2023-01-01 00:00 UTC), 10.0),
            RawSample::new(datetime!(2023-01-01 12:00 UTC), 12.0),
        ];
        let records = normalize(&samples, 1000.0, &fuel());
        assert_eq!(records[0].delta_energy, 2000.0);
        assert!((records[0].span_days() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nan_reading_is_treated_as_reset() {
        let samples = [
            RawSample::new(datetime!(2023-01-01 00:00 UTC), 10.0),
            RawSample::new(datetime!(2023-01-02 00:00 UTC), f64::NAN),
        ];
        let records = normalize(&samples, 1.0, &fuel());
        assert!(!records[0].is_valid());
        assert_eq!(records[0].volume(), None);
    }
}
