use std::collections::BTreeMap;

use meter_client::domain::RawSample;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{
    aggregate::{aggregate_days, aggregate_months, PeriodBucket},
    billing::{resolve, BillingResult},
    calendar::YearMonth,
    chart::{DailyChart, HistoryChart},
    config::EngineConfig,
    history::{build_series, HistoricalSeries},
    sources::ReadingSource,
    transform::normalize,
};

#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("customer directory error: {0}")]
    Directory(String),
}

/// One customer's meter and the month to bill.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingRequest {
    pub meter_id: String,
    /// Converts raw counter units into energy units (1.0 when already BTU).
    pub unit_multiplier: f64,
    pub period: YearMonth,
    /// Expected consumption keyed by month number (1-12).
    pub expected_by_month: BTreeMap<u8, f64>,
}

impl BillingRequest {
    /// Readings needed: a year before the billing month through a bit past it.
    pub fn fetch_window(&self, config: &EngineConfig) -> Result<(OffsetDateTime, OffsetDateTime), BillingError> {
        let month_start = self.period.start_at(config.offset());
        let start = month_start.checked_sub(Duration::days(365));
        let end = month_start.checked_add(Duration::days(31));
        match (start, end) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(BillingError::InvalidRequest(format!(
                "billing period {} has no representable fetch window",
                self.period
            ))),
        }
    }

    fn validate(&self) -> Result<(), BillingError> {
        if self.meter_id.trim().is_empty() {
            return Err(BillingError::InvalidRequest("meter id is empty".to_string()));
        }
        if !self.unit_multiplier.is_finite() {
            return Err(BillingError::InvalidRequest(format!(
                "unit multiplier for meter {} is not a finite number",
                self.meter_id
            )));
        }
        if self.unit_multiplier < 0.0 {
            return Err(BillingError::InvalidRequest(format!(
                "unit multiplier for meter {} is negative ({})",
                self.meter_id, self.unit_multiplier
            )));
        }
        if !self.period.is_supported() {
            return Err(BillingError::InvalidRequest(format!(
                "billing period {} is outside the supported years",
                self.period
            )));
        }
        Ok(())
    }
}

/// Everything computed for one (meter, month) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingReport {
    pub meter_id: String,
    pub billing: BillingResult,
    pub monthly: Vec<PeriodBucket>,
    pub daily: Vec<PeriodBucket>,
    pub history: HistoricalSeries,
    pub daily_chart: DailyChart,
    pub history_chart: HistoryChart,
    pub sample_count: usize,
    pub reset_count: usize,
}

/// Run the accounting stages over already-fetched samples.
///
/// Pure and synchronous: the same samples, request and config always give the
/// same report.
pub fn compute(samples: &[RawSample], request: &BillingRequest, config: &EngineConfig) -> BillingReport {
    let offset = config.offset();
    let records = normalize(samples, request.unit_multiplier, &config.fuel);

    let monthly = aggregate_months(&records, request.period, offset);
    let daily = aggregate_days(&records, request.period, offset);

    let billing = resolve(&monthly, request.period);
    let history = build_series(&monthly, &request.expected_by_month, config.max_bill_day_err);

    let daily_chart = DailyChart::build(&daily, config);
    let history_chart = HistoryChart::build(&history);

    BillingReport {
        meter_id: request.meter_id.clone(),
        reset_count: records.iter().filter(|r| !r.is_valid()).count(),
        sample_count: samples.len(),
        billing,
        monthly,
        daily,
        history,
        daily_chart,
        history_chart,
    }
}

pub struct BillingPipeline<S> {
    pub source: S,
    pub config: EngineConfig,
}

impl<S> BillingPipeline<S>
where
    S: ReadingSource,
{
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self { source, config }
    }

    /// Fetch readings for `request` and compute its report.
    ///
    /// A month without usable readings is not an error; it comes back with
    /// `billing.has_data == false`.
    pub async fn run(&self, request: &BillingRequest) -> Result<BillingReport, BillingError> {
        request.validate()?;
        let (start, end) = request.fetch_window(&self.config)?;

        let fetch = self.source.fetch(&request.meter_id, start, end);
        let samples = match tokio::time::timeout(self.config.fetch_timeout(), fetch).await {
            Ok(res) => res?,
            Err(_) => {
                metrics::counter!("reading_source_errors_total").increment(1);
                return Err(BillingError::DataUnavailable(format!(
                    "fetching readings for meter {} timed out after {:?}",
                    request.meter_id,
                    self.config.fetch_timeout()
                )));
            }
        };

        if samples.is_empty() {
            return Err(BillingError::DataUnavailable(format!(
                "meter {} returned no readings between {start} and {end}",
                request.meter_id
            )));
        }

        let report = compute(&samples, request, &self.config);

        metrics::counter!("billing_runs_total").increment(1);
        if !report.billing.has_data {
            metrics::counter!("billing_no_data_total").increment(1);
        }
        tracing::info!(
            meter_id = %request.meter_id,
            period = %request.period,
            samples = report.sample_count,
            resets = report.reset_count,
            has_data = report.billing.has_data,
            total_volume = ?report.billing.total_volume,
            reliable_months = report.history.reliable_months(),
            "billing run complete"
        );

        Ok(report)
    }
}
