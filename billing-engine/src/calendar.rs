use std::{fmt, ops::RangeInclusive, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

use crate::pipeline::BillingError;

/// Years accepted by [`YearMonth::new`]. One year is kept free at each end of
/// the `time` date range so a billing month's history and fetch window exist.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = -9998..=9998;

/// A calendar month, stored as the date of its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    first: Date,
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Result<Self, BillingError> {
        if !SUPPORTED_YEARS.contains(&year) {
            return Err(BillingError::InvalidRequest(format!(
                "year {year} is outside {}..={}",
                SUPPORTED_YEARS.start(),
                SUPPORTED_YEARS.end()
            )));
        }
        let month = Month::try_from(month)
            .map_err(|e| BillingError::InvalidRequest(format!("invalid month {month}: {e}")))?;
        let first = Date::from_calendar_date(year, month, 1)
            .map_err(|e| BillingError::InvalidRequest(format!("invalid year {year}: {e}")))?;
        Ok(Self { first })
    }

    /// The month a date falls in.
    pub fn containing(date: Date) -> Self {
        Self {
            first: date - Duration::days(i64::from(date.day()) - 1),
        }
    }

    /// The month an instant falls in when read at `offset`.
    pub fn of_instant(ts: OffsetDateTime, offset: UtcOffset) -> Self {
        Self::containing(ts.to_offset(offset).date())
    }

    pub fn year(self) -> i32 {
        self.first.year()
    }

    pub fn month(self) -> Month {
        self.first.month()
    }

    /// Month number, 1 through 12.
    pub fn number(self) -> u8 {
        u8::from(self.first.month())
    }

    pub fn first_day(self) -> Date {
        self.first
    }

    pub fn days(self) -> u8 {
        time::util::days_in_year_month(self.year(), self.month())
    }

    /// Midnight of the first day, at `offset`.
    pub fn start_at(self, offset: UtcOffset) -> OffsetDateTime {
        self.first.midnight().assume_offset(offset)
    }

    /// Whether this month lies in [`SUPPORTED_YEARS`].
    pub fn is_supported(self) -> bool {
        SUPPORTED_YEARS.contains(&self.year())
    }

    /// The following month; the last representable month is its own successor.
    pub fn next(self) -> Self {
        self.first
            .checked_add(Duration::days(i64::from(self.days())))
            .map_or(self, |first| Self { first })
    }

    /// The preceding month; the first representable month is its own predecessor.
    pub fn previous(self) -> Self {
        self.first.previous_day().map_or(self, Self::containing)
    }

    /// The month `n` months before this one.
    pub fn back(self, n: usize) -> Self {
        (0..n).fold(self, |m, _| m.previous())
    }

    /// Signed number of months from `earlier` to `self`.
    pub fn months_since(self, earlier: Self) -> i32 {
        (self.year() - earlier.year()) * 12 + i32::from(self.number()) - i32::from(earlier.number())
    }

    /// Short chart label, e.g. `Mar '24`.
    pub fn label(self) -> String {
        format!("{} '{:02}", month_abbrev(self.month()), self.year().rem_euclid(100))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.number())
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for YearMonth {
    type Err = BillingError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| BillingError::InvalidRequest(format!("expected YYYY-MM, got '{s}'")))?;
        let year: i32 = year
            .parse()
            .map_err(|e| BillingError::InvalidRequest(format!("invalid year in '{s}': {e}")))?;
        let month: u8 = month
            .parse()
            .map_err(|e| BillingError::InvalidRequest(format!("invalid month in '{s}': {e}")))?;
        Self::new(year, month)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

fn month_abbrev(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, offset};

    #[test]
    fn rejects_month_out_of_range() {
        assert!(matches!(YearMonth::new(2024, 0), Err(BillingError::InvalidRequest(_))));
        assert!(matches!(YearMonth::new(2024, 13), Err(BillingError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_years_at_the_edge_of_the_date_range() {
        assert!(matches!(YearMonth::new(9999, 12), Err(BillingError::InvalidRequest(_))));
        assert!(matches!(YearMonth::new(-9999, 1), Err(BillingError::InvalidRequest(_))));
        assert!("9999-12".parse::<YearMonth>().is_err());

        let last = YearMonth::new(9998, 12).unwrap();
        assert_eq!(last.next(), YearMonth::containing(date!(9999-01-01)));
        assert_eq!(YearMonth::new(-9998, 1).unwrap().back(11).year(), -9999);
    }

    #[test]
    fn navigation_saturates_at_representable_range() {
        let max = YearMonth::containing(Date::MAX);
        assert!(!max.is_supported());
        assert_eq!(max.next(), max);

        let min = YearMonth::containing(Date::MIN);
        assert_eq!(min.previous(), min);
    }

    #[test]
    fn navigates_across_year_boundary() {
        let jan = YearMonth::new(2024, 1).unwrap();
        assert_eq!(jan.previous(), YearMonth::new(2023, 12).unwrap());
        assert_eq!(jan.previous().next(), jan);
        assert_eq!(jan.back(11), YearMonth::new(2023, 2).unwrap());
        assert_eq!(jan.months_since(jan.back(11)), 11);
    }

    #[test]
    fn knows_month_lengths() {
        assert_eq!(YearMonth::new(2024, 2).unwrap().days(), 29);
        assert_eq!(YearMonth::new(2023, 2).unwrap().days(), 28);
        assert_eq!(YearMonth::new(2023, 4).unwrap().days(), 30);
    }

    #[test]
    fn instants_are_read_at_billing_offset() {
        let ts = datetime!(2024-03-01 03:00 UTC);
        assert_eq!(YearMonth::of_instant(ts, UtcOffset::UTC), YearMonth::new(2024, 3).unwrap());
        assert_eq!(YearMonth::of_instant(ts, offset!(-9)), YearMonth::new(2024, 2).unwrap());
        assert_eq!(YearMonth::containing(date!(2024-03-31)).first_day(), date!(2024-03-01));
    }

    #[test]
    fn formats_labels() {
        let m = YearMonth::new(2024, 3).unwrap();
        assert_eq!(m.label(), "Mar '24");
        assert_eq!(m.to_string(), "2024-03");
        assert_eq!(YearMonth::new(2009, 12).unwrap().label(), "Dec '09");
    }

    #[test]
    fn parses_year_month() {
        assert_eq!("2024-03".parse::<YearMonth>().unwrap(), YearMonth::new(2024, 3).unwrap());
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("March 2024".parse::<YearMonth>().is_err());
    }
}
