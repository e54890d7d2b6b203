pub mod fixture_csv;
pub mod questdb;

pub use fixture_csv::FixtureReadingSource;
pub use questdb::QuestDbReadingSource;

use meter_client::domain::RawSample;
use time::OffsetDateTime;

use crate::pipeline::BillingError;

/// Meter ids starting with this prefix are served from recorded fixtures.
pub const FIXTURE_PREFIX: &str = "test-";

pub fn is_fixture_meter(meter_id: &str) -> bool {
    meter_id.starts_with(FIXTURE_PREFIX)
}

/// Where cumulative counter samples come from.
///
/// Implementations return samples within `[start, end]` (both inclusive),
/// ascending and unique per timestamp; [`normalize_samples`] enforces that.
#[async_trait::async_trait]
pub trait ReadingSource: Send + Sync {
    async fn fetch(
        &self,
        meter_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<RawSample>, BillingError>;
}

pub(crate) fn check_range(start: OffsetDateTime, end: OffsetDateTime) -> Result<(), BillingError> {
    if start > end {
        return Err(BillingError::InvalidRequest(format!(
            "reading range start {start} is after end {end}"
        )));
    }
    Ok(())
}

/// Clip to `[start, end]`, sort, and keep the last sample seen for any
/// repeated timestamp.
pub fn normalize_samples(mut samples: Vec<RawSample>, start: OffsetDateTime, end: OffsetDateTime) -> Vec<RawSample> {
    samples.retain(|s| s.ts >= start && s.ts <= end);
    // Stable sort, so source order decides between duplicates.
    samples.sort_by_key(|s| s.ts);

    let mut out: Vec<RawSample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match out.last_mut() {
            Some(last) if last.ts == sample.ts => *last = sample,
            _ => out.push(sample),
        }
    }
    out
}

/// Sends fixture meter ids to the fixture source and everything else to the
/// live telemetry source.
pub struct RoutingReadingSource<L> {
    live: Option<L>,
    fixtures: FixtureReadingSource,
}

impl<L> RoutingReadingSource<L> {
    pub fn new(live: Option<L>, fixtures: FixtureReadingSource) -> Self {
        Self { live, fixtures }
    }
}

#[async_trait::async_trait]
impl<L: ReadingSource> ReadingSource for RoutingReadingSource<L> {
    async fn fetch(
        &self,
        meter_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<RawSample>, BillingError> {
        check_range(start, end)?;
        if is_fixture_meter(meter_id) {
            return self.fixtures.fetch(meter_id, start, end).await;
        }
        match &self.live {
            Some(live) => live.fetch(meter_id, start, end).await,
            None => Err(BillingError::DataUnavailable(format!(
                "no live reading source configured for meter {meter_id}"
            ))),
        }
    }
}
