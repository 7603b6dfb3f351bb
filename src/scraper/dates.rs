//! Date-range derivation for scrape runs.
//!
//! The release week starts on Wednesday; `weekly` mode crawls the current
//! release week, the `from_today` modes crawl forward from today.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Valid range for the per-run day count.
const MIN_DAYS: u32 = 1;
const MAX_DAYS: u32 = 14;

/// How the target date range is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeMode {
    /// Current release week: Wednesday through Tuesday.
    Weekly,
    /// Today plus the configured number of days.
    FromToday,
    /// Today through the end of the current release week (next Tuesday).
    FromTodayLimited,
}

impl Default for ScrapeMode {
    fn default() -> Self {
        Self::FromTodayLimited
    }
}

/// The Wednesday on or before `date`.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    let offset = (date.weekday().num_days_from_sunday() + 7 - 3) % 7;
    date - Duration::days(i64::from(offset))
}

fn consecutive_dates(start: NaiveDate, days: u32) -> Vec<NaiveDate> {
    let days = days.clamp(MIN_DAYS, MAX_DAYS);
    (0..days)
        .map(|i| start + Duration::days(i64::from(i)))
        .collect()
}

/// Dates to scrape for `mode`, anchored at `today`.
///
/// `days` falls back to 7 when unset; counts clamp to 1..=14.
pub fn scrape_dates(mode: ScrapeMode, days: Option<u32>, today: NaiveDate) -> Vec<NaiveDate> {
    match mode {
        ScrapeMode::Weekly => consecutive_dates(week_start_for(today), days.unwrap_or(7)),
        ScrapeMode::FromToday => consecutive_dates(today, days.unwrap_or(7)),
        ScrapeMode::FromTodayLimited => {
            let weekday = today.weekday().num_days_from_sunday();
            let days_until_tuesday = (2 + 7 - weekday) % 7;
            let window = if days_until_tuesday == 0 {
                1
            } else {
                days_until_tuesday + 1
            };
            let count = days.map_or(window, |d| d.min(window));
            consecutive_dates(today, count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_start_is_wednesday_on_or_before() {
        // 2026-02-20 is a Friday; the week's Wednesday is the 18th.
        assert_eq!(week_start_for(date(2026, 2, 20)), date(2026, 2, 18));
        // A Wednesday is its own week start.
        assert_eq!(week_start_for(date(2026, 2, 18)), date(2026, 2, 18));
        // Tuesday belongs to the previous week.
        assert_eq!(week_start_for(date(2026, 2, 17)), date(2026, 2, 11));
    }

    #[test]
    fn weekly_mode_covers_the_release_week() {
        let dates = scrape_dates(ScrapeMode::Weekly, None, date(2026, 2, 20));
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], date(2026, 2, 18));
        assert_eq!(dates[6], date(2026, 2, 24));
    }

    #[test]
    fn from_today_starts_today() {
        let dates = scrape_dates(ScrapeMode::FromToday, Some(3), date(2026, 2, 20));
        assert_eq!(dates, vec![date(2026, 2, 20), date(2026, 2, 21), date(2026, 2, 22)]);
    }

    #[test]
    fn from_today_limited_stops_at_tuesday() {
        // Friday the 20th: Sat, Sun, Mon, Tue remain -> 5 days including today.
        let dates = scrape_dates(ScrapeMode::FromTodayLimited, None, date(2026, 2, 20));
        assert_eq!(dates.len(), 5);
        assert_eq!(*dates.last().unwrap(), date(2026, 2, 24));

        // On a Tuesday only that day is left.
        let dates = scrape_dates(ScrapeMode::FromTodayLimited, None, date(2026, 2, 24));
        assert_eq!(dates, vec![date(2026, 2, 24)]);
    }

    #[test]
    fn from_today_limited_respects_smaller_day_count() {
        let dates = scrape_dates(ScrapeMode::FromTodayLimited, Some(2), date(2026, 2, 20));
        assert_eq!(dates.len(), 2);
    }

    #[test]
    fn day_count_clamps_to_valid_range() {
        let dates = scrape_dates(ScrapeMode::FromToday, Some(90), date(2026, 2, 20));
        assert_eq!(dates.len(), 14);
        let dates = scrape_dates(ScrapeMode::FromToday, Some(0), date(2026, 2, 20));
        assert_eq!(dates.len(), 1);
    }
}
