use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::RawSample;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SensorReadingBounds {
    pub first_ts: Option<OffsetDateTime>,
    pub last_ts: Option<OffsetDateTime>,
    pub readings: i64,
}

/// Fetch the time-ordered cumulative counter samples of one sensor.
///
/// Both ends of the range are inclusive. Rows without a value are skipped.
pub async fn counter_readings(
    pool: &PgPool,
    sensor_id: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<RawSample>> {
    let rows = sqlx::query_as::<_, RawSample>(
        r#"
        SELECT
            ts,
            value
        FROM meter_readings
        WHERE sensor_id = $1
          AND ts >= $2
          AND ts <= $3
          AND value IS NOT NULL
        ORDER BY ts
        "#,
    )
    .bind(sensor_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// First and last reading timestamps stored for a sensor, plus the row count.
///
/// Useful to tell "sensor never reported" apart from "no readings in the
/// requested window" when a fetch comes back empty.
pub async fn reading_bounds(pool: &PgPool, sensor_id: &str) -> Result<SensorReadingBounds> {
    let row = sqlx::query_as::<_, SensorReadingBounds>(
        r#"
        SELECT
            min(ts)  AS first_ts,
            max(ts)  AS last_ts,
            count(*) AS readings
        FROM meter_readings
        WHERE sensor_id = $1
        "#,
    )
    .bind(sensor_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
