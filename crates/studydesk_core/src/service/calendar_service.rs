//! Calendar day notes shown on the dashboard.
//!
//! # Invariants
//! - Keys are canonical `YYYY-MM-DD` dates; at most one note per day.
//! - Saving blank text removes the day's note.

use crate::index::{IndexError, IndexStore};
use crate::model::index::Index;
use chrono::{Datelike, NaiveDate};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub enum CalendarError {
    InvalidDate(String),
    InvalidMonth { year: i32, month: u32 },
    Index(IndexError),
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate(value) => {
                write!(f, "invalid calendar date `{value}`; expected YYYY-MM-DD")
            }
            Self::InvalidMonth { year, month } => write!(f, "invalid month {year}-{month}"),
            Self::Index(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CalendarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Index(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IndexError> for CalendarError {
    fn from(value: IndexError) -> Self {
        Self::Index(value)
    }
}

/// Parses a canonical `YYYY-MM-DD` key.
pub fn parse_date_key(value: &str) -> Result<NaiveDate, CalendarError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, DATE_KEY_FORMAT)
        .ok()
        .filter(|date| date_key(*date) == trimmed)
        .ok_or_else(|| CalendarError::InvalidDate(value.to_string()))
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub struct CalendarService<'a> {
    store: &'a mut IndexStore,
}

impl<'a> CalendarService<'a> {
    pub fn new(store: &'a mut IndexStore) -> Self {
        Self { store }
    }

    /// Creates or replaces the note for `date`; blank `text` removes it.
    ///
    /// Returns the stored text, or `None` when the day is now empty.
    pub fn set_note(
        &mut self,
        date: NaiveDate,
        text: &str,
    ) -> Result<Option<String>, CalendarError> {
        if text.trim().is_empty() {
            self.remove(date)?;
            return Ok(None);
        }

        let key = date_key(date);
        let text = text.to_string();
        let stored = text.clone();
        self.store.mutate(|index| {
            index.calendar_notes.insert(key, text);
        })?;
        info!("event=calendar_set module=calendar status=ok chars={}", stored.chars().count());
        Ok(Some(stored))
    }

    pub fn note(&self, date: NaiveDate) -> Option<String> {
        self.store
            .index()
            .calendar_notes
            .get(&date_key(date))
            .cloned()
    }

    /// Removes the note for `date`. Returns `false` when there was none.
    pub fn remove(&mut self, date: NaiveDate) -> Result<bool, CalendarError> {
        let key = date_key(date);
        if !self.store.index().calendar_notes.contains_key(&key) {
            return Ok(false);
        }
        self.store.mutate(|index| {
            index.calendar_notes.remove(&key);
        })?;
        info!("event=calendar_remove module=calendar status=ok");
        Ok(true)
    }

    /// Notes falling in `year`-`month`, sorted by day.
    pub fn notes_in_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<(NaiveDate, String)>, CalendarError> {
        month_notes(self.store.index(), year, month)
    }
}

/// Notes of one month, sorted by date.
pub fn month_notes(
    index: &Index,
    year: i32,
    month: u32,
) -> Result<Vec<(NaiveDate, String)>, CalendarError> {
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err(CalendarError::InvalidMonth { year, month });
    }

    Ok(index
        .calendar_notes
        .iter()
        .filter_map(|(key, text)| parse_date_key(key).ok().map(|date| (date, text)))
        .filter(|(date, _)| date.year() == year && date.month() == month)
        .map(|(date, text)| (date, text.clone()))
        .collect())
}
