use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::models::Pollutant;

/// Identifies one rolling series: a station, a pollutant and an hour of the day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorKey {
    pub station: String,
    pub pollutant: Pollutant,
    pub hour: u8,
}

impl SensorKey {
    pub fn new(station: impl Into<String>, pollutant: Pollutant, hour: u8) -> Self {
        Self {
            station: station.into(),
            pollutant,
            hour,
        }
    }
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:02}h", self.station, self.pollutant, self.hour)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub day: NaiveDate,
    pub value: f64,
}

impl HistoryEntry {
    pub fn new(day: NaiveDate, value: f64) -> Self {
        Self { day, value }
    }
}

/// Day-ordered readings of one series, oldest first.
///
/// Capacity is owned by the store; a `History` only guarantees strict day ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.entries.front().map(|e| e.day)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.entries.back().map(|e| e.day)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        self.entries.iter().map(|e| e.day).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.value).collect()
    }

    /// Returns the current last day when `day` would break the ordering.
    pub fn check_append(&self, day: NaiveDate) -> Result<(), NaiveDate> {
        match self.last_day() {
            Some(last) if day <= last => Err(last),
            _ => Ok(()),
        }
    }

    /// Appends after `check_append` passed, evicting from the front past `capacity`.
    pub(crate) fn push_evicting(
        &mut self,
        entry: HistoryEntry,
        capacity: usize,
    ) -> Option<HistoryEntry> {
        debug_assert!(self.check_append(entry.day).is_ok());
        let evicted = if self.entries.len() >= capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Mean of the entries dated within `[today - n_days, today]`, `None` when there are none.
    pub fn windowed_average(&self, n_days: u32, today: NaiveDate) -> Option<f64> {
        let window_start = today - Duration::days(n_days as i64);
        let mut sum = 0.0;
        let mut count = 0usize;

        for entry in self.entries.iter().rev() {
            if entry.day < window_start {
                break;
            }
            if entry.day <= today {
                sum += entry.value;
                count += 1;
            }
        }

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    pub(crate) fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub(crate) fn is_strictly_ordered(&self) -> bool {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .all(|(a, b)| a.day < b.day)
    }
}
