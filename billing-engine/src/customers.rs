use std::{collections::BTreeMap, fs::File, path::Path};

use csv::StringRecord;

use crate::{
    calendar::YearMonth,
    invoice::PriceTerms,
    pipeline::{BillingError, BillingRequest},
};

/// Cell that marks the column-name row of the customer sheet export.
const HEADER_MARKER: &str = "sensor_id";

/// One row of the customer sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub customer: String,
    pub city: String,
    pub sensor_id: String,
    /// Multiplier converting the sensor value into BTUs.
    pub btu_mult: f64,
    /// Expected gallons saved, by month number.
    pub expected_by_month: BTreeMap<u8, f64>,
    pub prices: PriceTerms,
}

impl CustomerRecord {
    pub fn billing_request(&self, period: YearMonth) -> BillingRequest {
        BillingRequest {
            meter_id: self.sensor_id.clone(),
            unit_multiplier: self.btu_mult,
            period,
            expected_by_month: self.expected_by_month.clone(),
        }
    }

    /// `"2024-03 - Kotzebue - Clinic.pdf"`
    pub fn report_file_name(&self, period: YearMonth) -> String {
        format!("{period} - {} - {}.pdf", self.city, self.customer)
    }
}

/// Parse a sheet cell: blank is `None`, `"12%"` is 0.12, `$` and `,` are ignored.
pub fn parse_number(cell: &str) -> Result<Option<f64>, String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let (digits, divisor) = match trimmed.strip_suffix('%') {
        Some(pct) => (pct, 100.0),
        None => (trimmed, 1.0),
    };
    let cleaned: String = digits.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    cleaned
        .trim()
        .parse::<f64>()
        .map(|v| Some(v / divisor))
        .map_err(|e| format!("invalid number '{cell}': {e}"))
}

fn field<'r>(record: &'r StringRecord, headers: &StringRecord, name: &str) -> &'r str {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .and_then(|idx| record.get(idx))
        .unwrap_or("")
        .trim()
}

fn record_to_customer(
    record: &StringRecord,
    headers: &StringRecord,
    row: usize,
) -> Result<Option<CustomerRecord>, BillingError> {
    let get = |name: &str| field(record, headers, name);
    let number = |name: &str| -> Result<Option<f64>, BillingError> {
        parse_number(get(name)).map_err(|e| BillingError::Directory(format!("row {row}, column '{name}': {e}")))
    };

    let sensor_id = get("sensor_id");
    if sensor_id.is_empty() {
        return Ok(None);
    }

    let mut expected_by_month = BTreeMap::new();
    for month in 1..=12u8 {
        if let Some(gallons) = number(&format!("feas_g_{month:02}"))? {
            expected_by_month.insert(month, gallons);
        }
    }

    Ok(Some(CustomerRecord {
        customer: get("customer").to_string(),
        city: get("city").to_string(),
        sensor_id: sensor_id.to_string(),
        btu_mult: number("btu_mult")?.unwrap_or(1.0),
        expected_by_month,
        prices: PriceTerms {
            billed_price: number("billed_price")?,
            customer_price: number("customer_price")?,
        },
    }))
}

/// Read the customer sheet, exported as CSV.
///
/// Rows above the one containing a `sensor_id` cell (titles, notes) are
/// skipped; that row names the columns. Rows without a sensor id are ignored.
pub fn load_customers(path: &Path) -> Result<Vec<CustomerRecord>, BillingError> {
    let file = File::open(path)
        .map_err(|e| BillingError::Directory(format!("failed to open {}: {e}", path.display())))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut headers: Option<StringRecord> = None;
    let mut customers = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| BillingError::Directory(format!("failed to read CSV record: {e}")))?;
        if let Some(h) = headers.as_ref() {
            if let Some(customer) = record_to_customer(&record, h, idx + 1)? {
                customers.push(customer);
            }
            continue;
        }
        if record.iter().any(|cell| cell.trim() == HEADER_MARKER) {
            headers = Some(record);
        }
    }

    if headers.is_none() {
        return Err(BillingError::Directory(format!(
            "no '{HEADER_MARKER}' header row in {}",
            path.display()
        )));
    }

    tracing::info!(path = %path.display(), customers = customers.len(), "loaded customer directory");
    Ok(customers)
}
