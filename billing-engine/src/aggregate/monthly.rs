use time::UtcOffset;

use super::PeriodBucket;
use crate::{calendar::YearMonth, transform::DeltaRecord};

/// Number of calendar months in the trailing history, target month included.
pub const HISTORY_MONTHS: usize = 12;

/// Bucket records into the 12 calendar months ending at `target`.
///
/// A record belongs to the month its `ts` falls in at `offset`. The result
/// always has [`HISTORY_MONTHS`] buckets in chronological order; records
/// outside that range are ignored.
pub fn aggregate_months(records: &[DeltaRecord], target: YearMonth, offset: UtcOffset) -> Vec<PeriodBucket> {
    let first_month = target.back(HISTORY_MONTHS - 1);

    let mut slots = Vec::with_capacity(HISTORY_MONTHS);
    let mut month = first_month;
    slots.push(PeriodBucket::empty(month.first_day(), f64::from(month.days())));
    while slots.len() < HISTORY_MONTHS {
        month = month.next();
        slots.push(PeriodBucket::empty(month.first_day(), f64::from(month.days())));
    }

    for record in records {
        let idx = YearMonth::of_instant(record.ts, offset).months_since(first_month);
        if let Ok(idx) = usize::try_from(idx) {
            if let Some(slot) = slots.get_mut(idx) {
                slot.absorb(record);
            }
        }
    }

    slots
}
