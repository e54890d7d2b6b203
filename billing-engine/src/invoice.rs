use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{customers::CustomerRecord, history::HistoricalSeries, pipeline::BillingReport};

/// Per-gallon prices, decided upstream and consumed as plain numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTerms {
    /// Price per gallon saved that the customer is billed.
    pub billed_price: Option<f64>,
    /// What the customer would have paid per gallon of fuel.
    pub customer_price: Option<f64>,
}

/// Figures the document renderer and notification sender need for one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub report_file_name: String,
    pub customer: String,
    pub city: String,
    pub sensor_id: String,
    pub period: crate::calendar::YearMonth,
    pub volume: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
    pub billed_price: Option<f64>,
    pub customer_price: Option<f64>,
    pub amount_due: Option<f64>,
    pub fuel_value: Option<f64>,
    pub fingerprint: String,
}

impl InvoiceSummary {
    /// `None` when the billing month has no usable meter data.
    pub fn build(customer: &CustomerRecord, report: &BillingReport) -> Option<Self> {
        let billing = &report.billing;
        let (Some(volume), Some(period_start), Some(period_end)) =
            (billing.total_volume, billing.period_start, billing.period_end)
        else {
            return None;
        };
        let prices = customer.prices;

        Some(Self {
            report_file_name: customer.report_file_name(billing.period),
            customer: customer.customer.clone(),
            city: customer.city.clone(),
            sensor_id: customer.sensor_id.clone(),
            period: billing.period,
            volume,
            period_start,
            period_end,
            billed_price: prices.billed_price,
            customer_price: prices.customer_price,
            amount_due: prices.billed_price.map(|p| volume * p),
            fuel_value: prices.customer_price.map(|p| volume * p),
            fingerprint: fingerprint(report),
        })
    }
}

fn hash_f64(hasher: &mut blake3::Hasher, v: f64) {
    hasher.update(&v.to_bits().to_le_bytes());
}

fn hash_opt_f64(hasher: &mut blake3::Hasher, v: Option<f64>) {
    match v {
        Some(x) => {
            hasher.update(&[1]);
            hash_f64(hasher, x);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn hash_opt_ts(hasher: &mut blake3::Hasher, ts: Option<OffsetDateTime>) {
    match ts {
        Some(t) => {
            hasher.update(&[1]);
            hasher.update(&t.unix_timestamp_nanos().to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn hash_history(hasher: &mut blake3::Hasher, history: &HistoricalSeries) {
    hasher.update(&(history.points.len() as u32).to_le_bytes());
    for point in &history.points {
        hasher.update(&point.month.year().to_le_bytes());
        hasher.update(&[point.month.number(), point.quality as u8]);
        hash_opt_f64(hasher, point.actual_volume);
        hash_opt_f64(hasher, point.expected_volume);
    }
}

/// Digest of the billed figures and the trend, stable across identical reruns.
pub fn fingerprint(report: &BillingReport) -> String {
    let billing = &report.billing;
    let mut h = blake3::Hasher::new();
    h.update(&billing.period.year().to_le_bytes());
    h.update(&[billing.period.number(), u8::from(billing.has_data)]);
    hash_opt_f64(&mut h, billing.total_volume);
    hash_opt_ts(&mut h, billing.period_start);
    hash_opt_ts(&mut h, billing.period_end);
    hash_history(&mut h, &report.history);
    h.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::RawSample;
    use std::collections::BTreeMap;
    use time::macros::datetime;

    use crate::{calendar::YearMonth, config::EngineConfig, pipeline::compute};

    fn customer() -> CustomerRecord {
        CustomerRecord {
            customer: "Clinic".to_string(),
            city: "Kotzebue".to_string(),
            sensor_id: "btu_1".to_string(),
            btu_mult: 1.0,
            expected_by_month: (1..=12).map(|m| (m, 50.0)).collect::<BTreeMap<_, _>>(),
            prices: PriceTerms {
                billed_price: Some(4.0),
                customer_price: Some(6.5),
            },
        }
    }

    fn report(samples: &[RawSample]) -> BillingReport {
        let request = customer().billing_request(YearMonth::new(2023, 3).unwrap());
        compute(samples, &request, &EngineConfig::default())
    }

    fn samples() -> Vec<RawSample> {
        vec![
            RawSample::new(datetime!(2023-03-01 00:00 UTC), 0.0),
            RawSample::new(datetime!(2023-03-31 23:00 UTC), 1_108_000.0),
        ]
    }

    #[test]
    fn computes_amounts_from_price_terms() {
        let summary = InvoiceSummary::build(&customer(), &report(&samples())).unwrap();
        assert!((summary.volume - 10.0).abs() < 1e-9);
        assert!((summary.amount_due.unwrap() - 40.0).abs() < 1e-9);
        assert!((summary.fuel_value.unwrap() - 65.0).abs() < 1e-9);
        assert_eq!(summary.report_file_name, "2023-03 - Kotzebue - Clinic.pdf");
        assert_eq!(summary.period_start, datetime!(2023-03-01 00:00 UTC));
    }

    #[test]
    fn missing_price_leaves_amount_unknown() {
        let mut c = customer();
        c.prices.billed_price = None;
        let summary = InvoiceSummary::build(&c, &report(&samples())).unwrap();
        assert_eq!(summary.amount_due, None);
        assert!(summary.fuel_value.is_some());
    }

    #[test]
    fn no_data_month_builds_no_invoice() {
        assert!(InvoiceSummary::build(&customer(), &report(&[])).is_none());
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = fingerprint(&report(&samples()));
        let b = fingerprint(&report(&samples()));
        assert_eq!(a, b);

        let mut changed = samples();
        changed[1].value += 1.0;
        assert_ne!(a, fingerprint(&report(&changed)));
    }
}
