use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use meter_client::domain::RawSample;
use time::OffsetDateTime;

use super::{check_range, normalize_samples, ReadingSource, FIXTURE_PREFIX};
use crate::pipeline::BillingError;

/// Pre-recorded counter series for offline, deterministic runs.
///
/// Meter id `test-<name>` maps to `<dir>/<name>.csv`, with header columns:
/// - ts (RFC3339 timestamp)
/// - value (cumulative counter; blank cells are skipped)
pub struct FixtureReadingSource {
    dir: PathBuf,
}

impl FixtureReadingSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn fixture_path(&self, meter_id: &str) -> Result<PathBuf, BillingError> {
        let name = meter_id.strip_prefix(FIXTURE_PREFIX).unwrap_or(meter_id);
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(BillingError::DataUnavailable(format!("invalid fixture name '{name}'")));
        }
        Ok(self.dir.join(format!("{name}.csv")))
    }
}

fn record_to_sample(record: &StringRecord, headers: &StringRecord) -> Result<Option<RawSample>, BillingError> {
    let get = |name: &str| -> Result<&str, BillingError> {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| record.get(idx))
            .ok_or_else(|| BillingError::DataUnavailable(format!("missing column '{name}' in fixture record")))
    };

    let ts_str = get("ts")?;
    let ts = OffsetDateTime::parse(ts_str.trim(), &time::format_description::well_known::Rfc3339)
        .map_err(|e| BillingError::DataUnavailable(format!("invalid ts '{ts_str}': {e}")))?;

    let value_str = get("value")?.trim();
    if value_str.is_empty() {
        return Ok(None);
    }
    let value: f64 = value_str
        .parse()
        .map_err(|e| BillingError::DataUnavailable(format!("invalid value '{value_str}': {e}")))?;

    Ok(Some(RawSample::new(ts, value)))
}

#[async_trait::async_trait]
impl ReadingSource for FixtureReadingSource {
    async fn fetch(
        &self,
        meter_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<RawSample>, BillingError> {
        check_range(start, end)?;
        // Fixtures are small; a blocking read is fine here.
        let path = self.fixture_path(meter_id)?;
        let file = File::open(&path).map_err(|e| {
            BillingError::DataUnavailable(format!("failed to open fixture {}: {e}", path.display()))
        })?;
        let mut rdr = csv::Reader::from_reader(file);
        let headers = rdr
            .headers()
            .map_err(|e| BillingError::DataUnavailable(format!("failed to read fixture headers: {e}")))?
            .clone();

        let mut samples = Vec::new();
        for result in rdr.records() {
            let record =
                result.map_err(|e| BillingError::DataUnavailable(format!("failed to read fixture record: {e}")))?;
            if let Some(sample) = record_to_sample(&record, &headers)? {
                samples.push(sample);
            }
        }

        tracing::debug!(meter_id, path = %path.display(), samples = samples.len(), "loaded fixture readings");
        Ok(normalize_samples(samples, start, end))
    }
}
