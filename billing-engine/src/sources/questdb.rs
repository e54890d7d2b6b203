use std::time::Instant;

use meter_client::{db::reading_queries, domain::RawSample};
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

use super::{check_range, normalize_samples, ReadingSource};
use crate::pipeline::BillingError;

/// Live counter readings stored in QuestDB, queried over pgwire.
pub struct QuestDbReadingSource {
    pool: PgPool,
}

impl QuestDbReadingSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadingSource for QuestDbReadingSource {
    async fn fetch(
        &self,
        meter_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<RawSample>, BillingError> {
        check_range(start, end)?;
        let started = Instant::now();
        let res = reading_queries::counter_readings(&self.pool, meter_id, start, end).await;
        metrics::histogram!("reading_fetch_seconds").record(started.elapsed().as_secs_f64());

        let rows = match res {
            Ok(rows) => rows,
            Err(e) => {
                metrics::counter!("reading_source_errors_total").increment(1);
                tracing::error!(error = %e, meter_id, "questdb reading query failed");
                return Err(BillingError::DataUnavailable(format!(
                    "questdb query for meter {meter_id} failed: {e}"
                )));
            }
        };

        if rows.is_empty() {
            // Tell a silent sensor apart from a window it simply has no rows in.
            if let Ok(bounds) = reading_queries::reading_bounds(&self.pool, meter_id).await {
                tracing::warn!(
                    meter_id,
                    stored_readings = bounds.readings,
                    first_ts = ?bounds.first_ts,
                    last_ts = ?bounds.last_ts,
                    "no readings in requested window"
                );
            }
        }

        Ok(normalize_samples(rows, start, end))
    }
}
