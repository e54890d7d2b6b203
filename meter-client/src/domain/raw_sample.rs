use time::OffsetDateTime;

/// One reading of a cumulative counter (e.g. a BTU meter).
///
/// `value` only grows between counter resets, so consumption is derived from
/// the difference between successive samples.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSample {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub ts: OffsetDateTime,
    pub value: f64,
}

impl RawSample {
    pub fn new(ts: OffsetDateTime, value: f64) -> Self {
        Self { ts, value }
    }
}
