//! Date windows over which statistics are computed, and the helpers a date
//! selector uses to produce them.

use std::fmt::Display;

use thiserror::Error;
use time::{macros::date, macros::format_description, Date, Duration, Month};

use crate::storage::GroupFilter;

/// Week 1 starts on this date; every later week is a fixed seven-day block.
pub const DEFAULT_WEEK_ANCHOR: Date = date!(2026 - 01 - 01);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid month: {0}")]
    InvalidMonth(String),
    #[error("invalid year: {0}")]
    InvalidYear(String),
    #[error("invalid week range: {0}")]
    InvalidRange(String),
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),
}

pub fn format_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

pub fn parse_date(s: &str) -> Result<Date, WindowError> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| WindowError::InvalidDate(s.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Week,
    Month,
    Year,
}

impl std::str::FromStr for Dimension {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "week" => Ok(Dimension::Week),
            "month" => Ok(Dimension::Month),
            "year" => Ok(Dimension::Year),
            other => Err(WindowError::UnknownDimension(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    Day(Date),
    /// Inclusive on both ends.
    Range { start: Date, end: Date },
    Month { year: i32, month: Month },
    Year(i32),
}

impl DateWindow {
    /// Builds a window from a selector pair: `"start,end"` for weeks,
    /// `"YYYY-MM"` for months and `"YYYY"` for years.
    pub fn from_selector(dimension: Dimension, value: &str) -> Result<DateWindow, WindowError> {
        match dimension {
            Dimension::Week => {
                let (start, end) = value
                    .split_once(',')
                    .ok_or_else(|| WindowError::InvalidRange(value.to_string()))?;
                let start = parse_date(start)?;
                let end = parse_date(end)?;
                if start > end {
                    return Err(WindowError::InvalidRange(value.to_string()));
                }
                Ok(DateWindow::Range { start, end })
            },
            Dimension::Month => {
                let (year, month) = value
                    .trim()
                    .split_once('-')
                    .ok_or_else(|| WindowError::InvalidMonth(value.to_string()))?;
                let year = parse_year(year)?;
                let month = month
                    .parse::<u8>()
                    .ok()
                    .filter(|_| month.len() == 2)
                    .and_then(|m| Month::try_from(m).ok())
                    .ok_or_else(|| WindowError::InvalidMonth(value.to_string()))?;
                Ok(DateWindow::Month { year, month })
            },
            Dimension::Year => Ok(DateWindow::Year(parse_year(value.trim())?)),
        }
    }

    pub fn month_of(date: Date) -> DateWindow {
        DateWindow::Month { year: date.year(), month: date.month() }
    }

    pub fn year_of(date: Date) -> DateWindow {
        DateWindow::Year(date.year())
    }

    /// The `YYYY-MM` or `YYYY` prefix matched by month and year windows.
    pub fn prefix(&self) -> Option<String> {
        match self {
            DateWindow::Month { year, month } => Some(format!("{:04}-{:02}", year, *month as u8)),
            DateWindow::Year(year) => Some(format!("{:04}", year)),
            DateWindow::Day(_) | DateWindow::Range { .. } => None,
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        match self {
            DateWindow::Day(d) => *d == date,
            DateWindow::Range { start, end } => *start <= date && date <= *end,
            DateWindow::Month { year, month } => date.year() == *year && date.month() == *month,
            DateWindow::Year(year) => date.year() == *year,
        }
    }

    pub fn group_filter(&self) -> GroupFilter {
        match self {
            DateWindow::Day(d) => GroupFilter::DateRange { start: *d, end: *d },
            DateWindow::Range { start, end } => GroupFilter::DateRange { start: *start, end: *end },
            DateWindow::Month { .. } | DateWindow::Year(_) => {
                GroupFilter::DatePrefix(self.prefix().unwrap_or_default())
            },
        }
    }
}

impl Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateWindow::Day(d) => f.write_str(&format_date(*d)),
            DateWindow::Range { start, end } => write!(f, "{},{}", format_date(*start), format_date(*end)),
            DateWindow::Month { .. } | DateWindow::Year(_) => {
                f.write_str(&self.prefix().unwrap_or_default())
            },
        }
    }
}

fn parse_year(s: &str) -> Result<i32, WindowError> {
    if s.len() != 4 || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(WindowError::InvalidYear(s.to_string()));
    }
    s.parse().map_err(|_| WindowError::InvalidYear(s.to_string()))
}

/// Seven-day window number `week_number` (1-based) counted from `anchor`.
pub fn week_window(anchor: Date, week_number: u32) -> Option<DateWindow> {
    let offset = i64::from(week_number.max(1) - 1) * 7;
    let start = anchor.checked_add(Duration::days(offset))?;
    let end = start.checked_add(Duration::days(6))?;
    Some(DateWindow::Range { start, end })
}

/// Week number containing `date`; dates before the anchor fall in week 1.
pub fn week_number_for(anchor: Date, date: Date) -> u32 {
    if date < anchor {
        return 1;
    }
    let days = (date - anchor).whole_days();
    u32::try_from(days / 7).map(|w| w + 1).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_date() {
        let d = parse_date("2024-05-01").unwrap();
        assert_eq!(d, date!(2024 - 05 - 01));
        assert_eq!(format_date(d), "2024-05-01");
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_from_selector() {
        assert_eq!(
            DateWindow::from_selector(Dimension::Week, "2026-01-01,2026-01-07").unwrap(),
            DateWindow::Range { start: date!(2026 - 01 - 01), end: date!(2026 - 01 - 07) }
        );
        assert_eq!(
            DateWindow::from_selector(Dimension::Month, "2024-05").unwrap(),
            DateWindow::Month { year: 2024, month: Month::May }
        );
        assert_eq!(DateWindow::from_selector(Dimension::Year, "2024").unwrap(), DateWindow::Year(2024));

        assert!(DateWindow::from_selector(Dimension::Week, "2026-01-07,2026-01-01").is_err());
        assert!(DateWindow::from_selector(Dimension::Month, "2024-5").is_err());
        assert!(DateWindow::from_selector(Dimension::Month, "2024-13").is_err());
        assert!(DateWindow::from_selector(Dimension::Year, "24").is_err());
        assert_eq!("Month".parse::<Dimension>(), Ok(Dimension::Month));
    }

    #[test]
    fn test_prefix_and_contains() {
        let month = DateWindow::Month { year: 2024, month: Month::May };
        assert_eq!(month.prefix().as_deref(), Some("2024-05"));
        assert!(month.contains(date!(2024 - 05 - 31)));
        assert!(!month.contains(date!(2024 - 06 - 01)));
        assert_eq!(DateWindow::Year(2024).prefix().as_deref(), Some("2024"));
        assert_eq!(DateWindow::Day(date!(2024 - 05 - 01)).prefix(), None);
        assert_eq!(month.to_string(), "2024-05");
    }

    #[test]
    fn test_week_windows_from_anchor() {
        let anchor = DEFAULT_WEEK_ANCHOR;
        assert_eq!(
            week_window(anchor, 1),
            Some(DateWindow::Range { start: date!(2026 - 01 - 01), end: date!(2026 - 01 - 07) })
        );
        assert_eq!(
            week_window(anchor, 3),
            Some(DateWindow::Range { start: date!(2026 - 01 - 15), end: date!(2026 - 01 - 21) })
        );
        assert_eq!(week_number_for(anchor, date!(2026 - 01 - 07)), 1);
        assert_eq!(week_number_for(anchor, date!(2026 - 01 - 08)), 2);
        assert_eq!(week_number_for(anchor, date!(2025 - 12 - 25)), 1);
    }
}
