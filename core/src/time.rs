use chrono::{Datelike, Duration, Local, NaiveDate};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// A calendar month, the unit every record set and snapshot is scoped to.
///
/// Serialized and displayed as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(anyhow!("Invalid month: {}", month));
        }
        Ok(Self { year, month })
    }

    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (year_str, month_str) = input
            .split_once('-')
            .ok_or_else(|| anyhow!("Invalid month key '{}', expected YYYY-MM", input))?;
        if year_str.len() != 4 || month_str.len() != 2 {
            return Err(anyhow!("Invalid month key '{}', expected YYYY-MM", input));
        }
        let year: i32 = year_str.parse().map_err(|_| anyhow!("Invalid year in '{}'", input))?;
        let month: u32 = month_str.parse().map_err(|_| anyhow!("Invalid month in '{}'", input))?;
        Self::new(year, month)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Human label, e.g. "October 2026".
    pub fn label(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }

    /// Prefix match of the date's `YYYY-MM-DD` form against this key.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.format("%Y-%m-%d").to_string().starts_with(&self.to_string())
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// `YYYY_MM`, used in file names.
    pub fn file_suffix(&self) -> String {
        format!("{:04}_{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// Parses the date given for a new entry, relative to `today`.
///
/// Accepts `today`/`tod`, `yesterday`/`yes`, `-Nd` and `YYYY-MM-DD`.
pub fn parse_entry_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();
    match input.to_lowercase().as_str() {
        "today" | "tod" => return Ok(today),
        "yesterday" | "yes" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = input.strip_prefix('-') {
        if let Some(num_str) = rest.strip_suffix('d') {
            let days: u32 = num_str.parse().map_err(|_| anyhow!("Invalid relative date: {}", input))?;
            return Duration::try_days(i64::from(days))
                .and_then(|delta| today.checked_sub_signed(delta))
                .ok_or_else(|| anyhow!("Relative date out of range: {}", input));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| anyhow!("Could not parse date: {}", input))
}
