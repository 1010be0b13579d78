//! Dashboard analytics: time windows, result shapes and derived metrics.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::CoreError;

/// Longest custom range accepted by the analytics endpoint.
pub const MAX_CUSTOM_RANGE_DAYS: i64 = 366;

/// Custom dates must fall in these calendar years.
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// The reporting window requested by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsRange {
    Day,
    Week,
    Month,
    Quarter,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl AnalyticsRange {
    /// Parse the `range` query parameter, or a `start_date`/`end_date` pair.
    ///
    /// Dates take precedence over `range`. With neither present the last
    /// seven days are reported.
    pub fn parse(
        range: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self, CoreError> {
        match (start_date, end_date) {
            (Some(start), Some(end)) => {
                let start = parse_date(start)?;
                let end = parse_date(end)?;
                if end < start {
                    return Err(CoreError::InvalidRange(
                        "end_date must be on or after start_date".to_string(),
                    ));
                }
                if (end - start).num_days() + 1 > MAX_CUSTOM_RANGE_DAYS {
                    return Err(CoreError::InvalidRange(format!(
                        "custom range cannot exceed {MAX_CUSTOM_RANGE_DAYS} days"
                    )));
                }
                return Ok(Self::Custom { start, end });
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(CoreError::InvalidRange(
                    "start_date and end_date must be supplied together".to_string(),
                ));
            }
            (None, None) => {}
        }

        match range.map(str::trim) {
            None | Some("") | Some("7d") => Ok(Self::Week),
            Some("1d") => Ok(Self::Day),
            Some("30d") => Ok(Self::Month),
            Some("90d") => Ok(Self::Quarter),
            Some(other) => Err(CoreError::InvalidRange(format!(
                "range must be one of 1d, 7d, 30d, 90d (got {other:?})"
            ))),
        }
    }

    /// Label echoed back in the snapshot.
    pub fn label(&self) -> String {
        match self {
            Self::Day => "1d".to_string(),
            Self::Week => "7d".to_string(),
            Self::Month => "30d".to_string(),
            Self::Quarter => "90d".to_string(),
            Self::Custom { start, end } => format!("{start}..{end}"),
        }
    }

    /// Resolve the range to a half-open `[start, end)` interval.
    ///
    /// Rolling ranges end at `now`; custom ranges cover whole UTC days.
    pub fn window(&self, now: DateTime<Utc>) -> AnalyticsWindow {
        let rolling = |days: i64| AnalyticsWindow {
            start: now - Duration::days(days),
            end: now,
        };
        match self {
            Self::Day => rolling(1),
            Self::Week => rolling(7),
            Self::Month => rolling(30),
            Self::Quarter => rolling(90),
            Self::Custom { start, end } => AnalyticsWindow {
                start: start_of_day(*start),
                end: end
                    .succ_opt()
                    .map_or(DateTime::<Utc>::MAX_UTC, start_of_day),
            },
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|date| YEARS.contains(&date.year()))
        .ok_or_else(|| CoreError::InvalidRange(format!("invalid date {raw:?}, expected YYYY-MM-DD")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Fixed rollup boundaries shown on the overview cards, independent of the
/// requested range.
#[derive(Debug, Clone, Copy)]
pub struct RollupBoundaries {
    pub today_start: DateTime<Utc>,
    pub week_start: DateTime<Utc>,
    pub month_start: DateTime<Utc>,
}

impl RollupBoundaries {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            today_start: start_of_day(now.date_naive()),
            week_start: now - Duration::days(7),
            month_start: now - Duration::days(30),
        }
    }
}

/// Fallback values used when a window holds no data to derive a metric from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricDefaults {
    pub bounce_rate: f64,
    pub avg_session_seconds: f64,
}

/// Fraction of visitors whose page-view count in the window is exactly one.
pub fn bounce_rate(single_view_visitors: i64, visitors_with_views: i64, default: f64) -> f64 {
    if visitors_with_views <= 0 {
        return default;
    }
    let rate = single_view_visitors as f64 / visitors_with_views as f64;
    (rate * 1000.0).round() / 1000.0
}

/// Mean session duration, or `fallback` when no positive durations exist.
pub fn average_session_seconds(mean: Option<f64>, fallback: f64) -> f64 {
    match mean {
        Some(m) if m.is_finite() && m > 0.0 => (m * 10.0).round() / 10.0,
        _ => fallback,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_visitors: i64,
    pub visitors_today: i64,
    pub visitors_this_week: i64,
    pub visitors_this_month: i64,
    pub visitors_in_range: i64,
    pub total_page_views: i64,
    pub page_views_in_range: i64,
    /// 0.0 – 1.0
    pub bounce_rate: f64,
    pub avg_session_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitorBreakdowns {
    pub countries: Vec<BreakdownRow>,
    pub cities: Vec<BreakdownRow>,
    /// Visitors first seen inside the window.
    pub new_visitors: i64,
    /// Visitors active inside the window but first seen before it.
    pub returning_visitors: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageRow {
    pub path: String,
    pub views: i64,
    pub unique_visitors: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub page_views: i64,
    pub visitors: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficBreakdowns {
    pub top_pages: Vec<PageRow>,
    pub devices: Vec<BreakdownRow>,
    pub browsers: Vec<BreakdownRow>,
    pub daily: Vec<DailyPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub range: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub overview: Overview,
    pub visitor_breakdowns: VisitorBreakdowns,
    pub traffic_breakdowns: TrafficBreakdowns,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_rolling_ranges() {
        assert_eq!(AnalyticsRange::parse(Some("1d"), None, None), Ok(AnalyticsRange::Day));
        assert_eq!(AnalyticsRange::parse(Some("30d"), None, None), Ok(AnalyticsRange::Month));
        assert_eq!(AnalyticsRange::parse(Some("90d"), None, None), Ok(AnalyticsRange::Quarter));
        assert_eq!(AnalyticsRange::parse(None, None, None), Ok(AnalyticsRange::Week));
        assert!(AnalyticsRange::parse(Some("365d"), None, None).is_err());
    }

    #[test]
    fn parse_custom_range() {
        let range = AnalyticsRange::parse(Some("1d"), Some("2026-01-01"), Some("2026-01-31"))
            .expect("custom range");
        assert_eq!(range.label(), "2026-01-01..2026-01-31");

        assert!(AnalyticsRange::parse(None, Some("2026-02-01"), Some("2026-01-01")).is_err());
        assert!(AnalyticsRange::parse(None, Some("2026-02-01"), None).is_err());
        assert!(AnalyticsRange::parse(None, Some("2024-01-01"), Some("2026-01-01")).is_err());
        assert!(AnalyticsRange::parse(None, Some("01/02/2026"), Some("2026-01-03")).is_err());
    }

    #[test]
    fn out_of_calendar_dates_are_rejected() {
        let max = NaiveDate::MAX.to_string();
        assert!(matches!(
            AnalyticsRange::parse(None, Some(&max), Some(&max)),
            Err(CoreError::InvalidRange(_))
        ));
        assert!(AnalyticsRange::parse(None, Some("+10000-01-01"), Some("+10000-01-02")).is_err());
        assert!(AnalyticsRange::parse(None, Some("0000-01-01"), Some("0000-01-02")).is_err());
    }

    #[test]
    fn last_representable_day_does_not_overflow() {
        let window = AnalyticsRange::Custom {
            start: NaiveDate::MAX,
            end: NaiveDate::MAX,
        }
        .window(Utc::now());
        assert_eq!(window.end, DateTime::<Utc>::MAX_UTC);

        let range = AnalyticsRange::parse(None, Some("9999-12-31"), Some("9999-12-31"))
            .expect("last supported day");
        let window = range.window(Utc::now());
        assert_eq!(window.end - window.start, Duration::days(1));
    }

    #[test]
    fn custom_window_covers_whole_days() {
        let range = AnalyticsRange::parse(None, Some("2026-03-01"), Some("2026-03-02"))
            .expect("custom range");
        let window = range.window(Utc::now());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap());
    }

    #[test]
    fn rolling_window_ends_now() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let window = AnalyticsRange::Week.window(now);
        assert_eq!(window.end, now);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 5, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn rollup_today_starts_at_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 15, 30, 0).unwrap();
        let bounds = RollupBoundaries::at(now);
        assert_eq!(bounds.today_start, Utc.with_ymd_and_hms(2026, 5, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn bounce_rate_is_fraction_of_single_view_visitors() {
        assert_eq!(bounce_rate(3, 5, 0.35), 0.6);
        assert_eq!(bounce_rate(0, 4, 0.35), 0.0);
        assert_eq!(bounce_rate(0, 0, 0.35), 0.35);
    }

    #[test]
    fn average_session_falls_back_without_data() {
        assert_eq!(average_session_seconds(None, 150.0), 150.0);
        assert_eq!(average_session_seconds(Some(0.0), 150.0), 150.0);
        assert_eq!(average_session_seconds(Some(42.25), 150.0), 42.3);
    }
}
