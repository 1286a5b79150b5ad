//! Relative date expressions such as "last month" resolved to closed calendar ranges.

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
	#[serde(with = "crate::time_serde::date")]
	pub start: Date,
	#[serde(with = "crate::time_serde::date")]
	pub end: Date,
}
impl DateRange {
	pub fn new(start: Date, end: Date) -> Self {
		if start <= end { Self { start, end } } else { Self { start: end, end: start } }
	}

	/// Both ends inclusive, compared in UTC.
	pub fn contains(&self, at: OffsetDateTime) -> bool {
		let date = at.to_offset(UtcOffset::UTC).date();

		self.start <= date && date <= self.end
	}
}

/// Resolves `expression` relative to `today`.
///
/// The first known phrase found anywhere in the text wins, so "Last month." and
/// "tickets from last month please" both resolve. Returns `None` for anything not understood;
/// callers then search without a date filter.
pub fn resolve(expression: &str, today: Date) -> Option<DateRange> {
	let normalized = expression
		.to_lowercase()
		.chars()
		.map(|c| if c.is_alphanumeric() || c == '-' || c == '/' { c } else { ' ' })
		.collect::<String>();
	let words = normalized.split_whitespace().collect::<Vec<_>>();

	if let Some(days) = words.windows(3).find_map(last_n_days) {
		let start = today.checked_sub(Duration::days(days))?;

		return Some(DateRange::new(start, today));
	}
	if has_phrase(&words, &["last", "week"]) {
		let this_monday = monday_of(today)?;
		let start = this_monday.checked_sub(Duration::days(7))?;
		let end = this_monday.previous_day()?;

		return Some(DateRange::new(start, end));
	}
	if has_phrase(&words, &["this", "week"]) {
		return Some(DateRange::new(monday_of(today)?, today));
	}
	if has_phrase(&words, &["last", "month"]) {
		let first_of_this = today.replace_day(1).ok()?;
		let last_of_previous = first_of_this.previous_day()?;

		return month_range(last_of_previous.year(), last_of_previous.month());
	}
	if has_phrase(&words, &["this", "month"]) {
		return Some(DateRange::new(today.replace_day(1).ok()?, today));
	}
	if has_phrase(&words, &["yesterday"]) {
		let day = today.previous_day()?;

		return Some(DateRange::new(day, day));
	}
	if has_phrase(&words, &["today"]) {
		return Some(DateRange::new(today, today));
	}

	words.iter().find_map(|word| year_month(word))
}

fn has_phrase(words: &[&str], phrase: &[&str]) -> bool {
	words.windows(phrase.len()).any(|window| window == phrase)
}

fn monday_of(day: Date) -> Option<Date> {
	day.checked_sub(Duration::days(i64::from(day.weekday().number_days_from_monday())))
}

fn month_range(year: i32, month: Month) -> Option<DateRange> {
	let start = Date::from_calendar_date(year, month, 1).ok()?;
	let next_month_start = if month == Month::December {
		Date::from_calendar_date(year.checked_add(1)?, Month::January, 1).ok()?
	} else {
		Date::from_calendar_date(year, month.next(), 1).ok()?
	};

	Some(DateRange::new(start, next_month_start.previous_day()?))
}

/// "last 7 days", "past 30 days", "last 1 day".
fn last_n_days(window: &[&str]) -> Option<i64> {
	let [lead, count, unit] = window else {
		return None;
	};

	if !matches!(*lead, "last" | "past") || !matches!(*unit, "day" | "days") {
		return None;
	}

	let days = count.parse::<i64>().ok()?;

	(days > 0 && days <= 3_660).then_some(days)
}

/// "2024-03" or "2024/03".
fn year_month(expression: &str) -> Option<DateRange> {
	let (year, month) = expression.split_once(['-', '/'])?;

	if year.len() != 4 || month.is_empty() || month.len() > 2 {
		return None;
	}

	let year = year.parse::<i32>().ok()?;
	let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;

	month_range(year, month)
}
