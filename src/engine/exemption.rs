use crate::error::LoopError;
use crate::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use std::collections::HashSet;

/// Source of the current market session state
///
/// Labels are free-form (e.g. `premarket`, `open`, `postmarket`, `closed`)
/// and compared case-insensitively against [`ExemptionFilters`].
pub trait MarketStatus {
    fn market_state(&mut self) -> anyhow::Result<String>;

    /// Wall clock used for weekday/date exemptions
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Market status that never changes
#[derive(Debug, Clone)]
pub struct StaticMarketStatus {
    state: String,
}

impl StaticMarketStatus {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
        }
    }
}

impl MarketStatus for StaticMarketStatus {
    fn market_state(&mut self) -> anyhow::Result<String> {
        Ok(self.state.clone())
    }
}

/// Conditions under which the live loop does not advance
///
/// States are lower-cased once at construction. Weekdays accept short or
/// full English names (`sat`, `Saturday`). Dates accept `YYYY-MM-DD`,
/// `DD/MM/YYYY` or `YYYY/MM/DD`. Blank entries are dropped; anything else
/// that does not parse is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExemptionFilters {
    states: HashSet<String>,
    weekdays: HashSet<Weekday>,
    dates: HashSet<NaiveDate>,
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

fn normalize<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn parse_weekday(entry: &str) -> Result<Weekday> {
    entry
        .parse()
        .map_err(|_| LoopError::InvalidSetting(format!("unknown exempt weekday '{}'", entry)))
}

fn parse_date(entry: &str) -> Result<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(entry, format).ok())
        .ok_or_else(|| LoopError::InvalidSetting(format!("unparseable exempt date '{}'", entry)))
}

/// Why the live loop stopped advancing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exemption {
    State(String),
    Weekday(Weekday),
    Date(NaiveDate),
}

impl std::fmt::Display for Exemption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exemption::State(state) => write!(f, "market state '{}'", state),
            Exemption::Weekday(day) => write!(f, "weekday {}", day),
            Exemption::Date(date) => write!(f, "date {}", date),
        }
    }
}

impl ExemptionFilters {
    pub fn new<A, B, C>(states: A, weekdays: B, dates: C) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self::default()
            .with_states(states)
            .with_weekdays(weekdays)?
            .with_dates(dates)
    }

    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.states = normalize(states).into_iter().collect();
        self
    }

    pub fn with_weekdays<I, S>(mut self, weekdays: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.weekdays = normalize(weekdays)
            .iter()
            .map(|entry| parse_weekday(entry))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn with_dates<I, S>(mut self, dates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dates = normalize(dates)
            .iter()
            .map(|entry| parse_date(entry))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.weekdays.is_empty() && self.dates.is_empty()
    }

    /// First matching exemption, if any
    pub fn matches(&self, state: &str, now: DateTime<Utc>) -> Option<Exemption> {
        let state = state.trim().to_lowercase();
        if self.states.contains(&state) {
            return Some(Exemption::State(state));
        }

        let weekday = now.weekday();
        if self.weekdays.contains(&weekday) {
            return Some(Exemption::Weekday(weekday));
        }

        let date = now.date_naive();
        if self.dates.contains(&date) {
            return Some(Exemption::Date(date));
        }

        None
    }
}
