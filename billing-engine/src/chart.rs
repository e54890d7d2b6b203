//! Chart-ready series handed to the external rasterizer.
//!
//! Missing values are plotted as markers sitting just above the x axis so that
//! "no reading" never looks like "zero consumption".

use std::{fs, path::{Path, PathBuf}};

use serde::Serialize;
use time::Date;

use crate::{aggregate::PeriodBucket, config::EngineConfig, history::HistoricalSeries, pipeline::BillingReport};

const DAILY_MARKER_FRACTION: f64 = 0.025;
const HISTORY_MARKER_FRACTION: f64 = 0.04;
/// Marker height when nothing positive is plotted.
const EMPTY_MARKER_HEIGHT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyChart {
    pub dates: Vec<Date>,
    pub volumes: Vec<Option<f64>>,
    pub missing_markers: Vec<Option<f64>>,
}

impl DailyChart {
    /// Days without data, or whose metered span is outside the configured
    /// band, are plotted as missing rather than as a partial sum.
    pub fn build(days: &[PeriodBucket], config: &EngineConfig) -> Self {
        let volumes: Vec<Option<f64>> = days
            .iter()
            .map(|day| {
                day.total_volume
                    .filter(|_| day.covered_within(config.daily_min_days, config.daily_max_days))
            })
            .collect();

        let marker = marker_height(volumes.iter().flatten().copied(), DAILY_MARKER_FRACTION);
        Self {
            dates: days.iter().map(|d| d.start).collect(),
            missing_markers: volumes.iter().map(|v| v.is_none().then_some(marker)).collect(),
            volumes,
        }
    }

    pub fn has_data(&self) -> bool {
        self.volumes.iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryChart {
    pub labels: Vec<String>,
    pub actual: Vec<Option<f64>>,
    pub expected: Vec<Option<f64>>,
    pub missing_markers: Vec<Option<f64>>,
}

impl HistoryChart {
    pub fn build(series: &HistoricalSeries) -> Self {
        let actual: Vec<Option<f64>> = series.points.iter().map(|p| p.actual_volume).collect();
        let expected: Vec<Option<f64>> = series.points.iter().map(|p| p.expected_volume).collect();

        let marker = marker_height(
            actual.iter().chain(expected.iter()).flatten().copied(),
            HISTORY_MARKER_FRACTION,
        );
        Self {
            labels: series.points.iter().map(|p| p.label.clone()).collect(),
            missing_markers: series
                .points
                .iter()
                .map(|p| (!p.is_reliable()).then_some(marker))
                .collect(),
            actual,
            expected,
        }
    }

    pub fn has_data(&self) -> bool {
        self.actual.iter().any(Option::is_some)
    }
}

/// Everything the rasterizer needs for one invoice, written next to it.
#[derive(Debug, Serialize)]
pub struct ChartBundle<'a> {
    pub daily: &'a DailyChart,
    pub history: &'a HistoryChart,
}

impl<'a> ChartBundle<'a> {
    pub fn from_report(report: &'a BillingReport) -> Self {
        Self {
            daily: &report.daily_chart,
            history: &report.history_chart,
        }
    }

    /// Store as `<report stem>.charts.json` in `dir`.
    pub fn write(&self, dir: &Path, report_file_name: &str) -> anyhow::Result<PathBuf> {
        let stem = Path::new(report_file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(report_file_name);
        let path = dir.join(format!("{stem}.charts.json"));
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

fn marker_height(values: impl Iterator<Item = f64>, fraction: f64) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * fraction
    } else {
        EMPTY_MARKER_HEIGHT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use time::{macros::datetime, Duration, UtcOffset};

    use crate::{
        aggregate::{aggregate_days, aggregate_months},
        calendar::YearMonth,
        history::build_series,
    };

    fn day_bucket(start: Date, hours: i64, volume: f64) -> PeriodBucket {
        let first = start.midnight().assume_offset(UtcOffset::UTC);
        let mut bucket = PeriodBucket::empty(start, 1.0);
        bucket.total_volume = Some(volume);
        bucket.first_reading_ts = Some(first);
        bucket.last_reading_ts = Some(first + Duration::hours(hours));
        bucket
    }

    #[test]
    fn out_of_band_day_becomes_missing_marker() {
        let d0 = datetime!(2023-03-01 00:00 UTC).date();
        let days = [
            day_bucket(d0, 24, 4.0),
            day_bucket(d0 + Duration::days(1), 12, 3.0),
            PeriodBucket::empty(d0 + Duration::days(2), 1.0),
        ];
        let chart = DailyChart::build(&days, &EngineConfig::default());

        assert_eq!(chart.volumes, vec![Some(4.0), None, None]);
        assert_eq!(chart.missing_markers, vec![None, Some(0.1), Some(0.1)]);
        assert!(chart.has_data());
    }

    #[test]
    fn empty_month_is_all_markers() {
        let target = YearMonth::new(2023, 4).unwrap();
        let days = aggregate_days(&[], target, UtcOffset::UTC);
        let daily = DailyChart::build(&days, &EngineConfig::default());
        assert!(!daily.has_data());
        assert_eq!(daily.volumes.len(), 30);
        assert_eq!(daily.missing_markers, vec![Some(EMPTY_MARKER_HEIGHT); 30]);

        let months = aggregate_months(&[], target, UtcOffset::UTC);
        let history = HistoryChart::build(&build_series(&months, &BTreeMap::new(), 6.0));
        assert!(!history.has_data());
        assert_eq!(history.labels.len(), 12);
        assert_eq!(history.missing_markers, vec![Some(EMPTY_MARKER_HEIGHT); 12]);
    }

    #[test]
    fn history_marker_scales_with_expected_values() {
        let target = YearMonth::new(2023, 4).unwrap();
        let months = aggregate_months(&[], target, UtcOffset::UTC);
        let expected: BTreeMap<u8, f64> = (1..=12).map(|m| (m, 250.0)).collect();
        let history = HistoryChart::build(&build_series(&months, &expected, 6.0));
        assert_eq!(history.expected, vec![Some(250.0); 12]);
        assert_eq!(history.missing_markers, vec![Some(10.0); 12]);
    }

    #[test]
    fn writes_bundle_next_to_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = YearMonth::new(2023, 4).unwrap();
        let daily = DailyChart::build(&aggregate_days(&[], target, UtcOffset::UTC), &EngineConfig::default());
        let history = HistoryChart::build(&build_series(
            &aggregate_months(&[], target, UtcOffset::UTC),
            &BTreeMap::new(),
            6.0,
        ));
        let bundle = ChartBundle {
            daily: &daily,
            history: &history,
        };

        let path = bundle.write(dir.path(), "2023-04 - Kotzebue - Clinic.pdf").unwrap();
        assert_eq!(path.file_name().unwrap(), "2023-04 - Kotzebue - Clinic.charts.json");
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["daily"]["dates"][0], "2023-04-01");
        assert_eq!(json["history"]["labels"][11], "Apr '23");
    }
}
