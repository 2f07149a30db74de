use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ProcessingError, Result};
use crate::models::Pollutant;
use crate::store::{DayBatch, History, HistoryEntry, SensorKey};
use crate::utils::constants::MAX_WINDOW_CAPACITY;

/// Store shared between the single advancer and any number of readers.
pub type SharedStore = Arc<RwLock<HistoryStore>>;

/// Rolling histories for every sensor key plus the checkpoint of the last folded day.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: u32,
    checkpoint: Option<NaiveDate>,
    series: HashMap<SensorKey, History>,
    halted: BTreeSet<SensorKey>,
}

/// What a single day's fold changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldSummary {
    pub day: NaiveDate,
    pub appended: usize,
    pub new_series: usize,
    pub evicted: usize,
    pub skipped_halted: usize,
    pub dropped: usize,
}

impl HistoryStore {
    pub fn new(capacity: u32) -> Result<Self> {
        if capacity == 0 || capacity > MAX_WINDOW_CAPACITY {
            return Err(ProcessingError::Config(format!(
                "Window capacity must be between 1 and {}, got {}",
                MAX_WINDOW_CAPACITY, capacity
            )));
        }

        Ok(Self {
            capacity,
            checkpoint: None,
            series: HashMap::new(),
            halted: BTreeSet::new(),
        })
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn checkpoint(&self) -> Option<NaiveDate> {
        self.checkpoint
    }

    pub fn is_initialized(&self) -> bool {
        self.checkpoint.is_some()
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn halted_keys(&self) -> impl Iterator<Item = &SensorKey> {
        self.halted.iter()
    }

    pub fn is_halted(&self, key: &SensorKey) -> bool {
        self.halted.contains(key)
    }

    /// Drops every series and the checkpoint, keeping the store usable with a new capacity.
    pub fn reset(&mut self, capacity: u32) -> Result<()> {
        *self = Self::new(capacity)?;
        Ok(())
    }

    /// Appends one reading to the tail of `key`'s history. A day at or before
    /// the tail halts the key and leaves its history unchanged.
    pub fn append(&mut self, key: SensorKey, day: NaiveDate, value: f64) -> Result<()> {
        if self.halted.contains(&key) {
            return Err(ProcessingError::HaltedSeries {
                key: key.to_string(),
            });
        }

        let capacity = self.capacity as usize;
        let history = self.series.entry(key.clone()).or_default();
        if let Err(last_day) = history.check_append(day) {
            warn!(key = %key, %day, %last_day, "halting series after out-of-order append");
            self.halted.insert(key.clone());
            return Err(ProcessingError::OutOfOrderDay {
                key: key.to_string(),
                day,
                last_day,
            });
        }
        history.push_evicting(HistoryEntry::new(day, value), capacity);
        Ok(())
    }

    /// Current history of `key`; empty when the key was never observed.
    pub fn get(&self, key: &SensorKey) -> History {
        self.series.get(key).cloned().unwrap_or_default()
    }

    /// Mean over `[today - n_days, today]`, `None` when the window holds no entry.
    pub fn windowed_average(&self, key: &SensorKey, n_days: u32, today: NaiveDate) -> Option<f64> {
        self.series
            .get(key)
            .and_then(|history| history.windowed_average(n_days, today))
    }

    pub fn observed_pollutants(&self, station: &str) -> BTreeSet<Pollutant> {
        self.series
            .keys()
            .filter(|key| key.station == station)
            .map(|key| key.pollutant)
            .collect()
    }

    pub fn observed_stations(&self) -> BTreeSet<&str> {
        self.series.keys().map(|key| key.station.as_str()).collect()
    }

    /// Applies a whole day and moves the checkpoint to it.
    ///
    /// Every key is checked before anything is written, so a failed fold leaves the store
    /// exactly as it was. Keys that break ordering are halted and skipped by later folds.
    pub fn fold_day(&mut self, batch: &DayBatch) -> Result<FoldSummary> {
        let day = batch.day;
        if let Some(checkpoint) = self.checkpoint {
            if day <= checkpoint {
                return Err(ProcessingError::OutOfOrderDay {
                    key: "checkpoint".to_string(),
                    day,
                    last_day: checkpoint,
                });
            }
        }

        let mut violations = Vec::new();
        for (key, _) in &batch.values {
            if self.halted.contains(key) {
                continue;
            }
            if let Some(Err(last_day)) = self.series.get(key).map(|h| h.check_append(day)) {
                violations.push((key.clone(), last_day));
            }
        }

        if let Some((first_key, first_last_day)) = violations.first().cloned() {
            for (key, last_day) in violations {
                warn!(key = %key, %day, %last_day, "halting series after out-of-order day");
                self.halted.insert(key);
            }
            return Err(ProcessingError::OutOfOrderDay {
                key: first_key.to_string(),
                day,
                last_day: first_last_day,
            });
        }

        let capacity = self.capacity as usize;
        let mut summary = FoldSummary {
            day,
            dropped: batch.dropped(),
            ..FoldSummary::default()
        };

        for (key, value) in &batch.values {
            if self.halted.contains(key) {
                summary.skipped_halted += 1;
                continue;
            }
            let history = self.series.entry(key.clone()).or_insert_with(|| {
                summary.new_series += 1;
                History::with_capacity(capacity)
            });
            if history
                .push_evicting(HistoryEntry::new(day, *value), capacity)
                .is_some()
            {
                summary.evicted += 1;
            }
            summary.appended += 1;
        }

        self.checkpoint = Some(day);
        debug!(
            %day,
            appended = summary.appended,
            evicted = summary.evicted,
            "folded day into store"
        );
        Ok(summary)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let mut series: Vec<SeriesSnapshot> = self
            .series
            .iter()
            .map(|(key, history)| SeriesSnapshot {
                key: key.clone(),
                entries: history.iter().copied().collect(),
            })
            .collect();
        series.sort_by(|a, b| a.key.cmp(&b.key));

        StoreSnapshot {
            capacity: self.capacity,
            checkpoint: self.checkpoint,
            series,
            halted: self.halted.iter().cloned().collect(),
        }
    }

    /// Rebuilds a store, rejecting snapshots that break capacity or ordering.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let mut store = Self::new(snapshot.capacity)?;
        store.checkpoint = snapshot.checkpoint;
        store.halted = snapshot.halted.into_iter().collect();

        for SeriesSnapshot { key, entries } in snapshot.series {
            if entries.len() > snapshot.capacity as usize {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Series {} holds {} entries, above capacity {}",
                    key,
                    entries.len(),
                    snapshot.capacity
                )));
            }
            let history = History::from_entries(entries);
            if !history.is_strictly_ordered() {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Series {} is not in strictly increasing day order",
                    key
                )));
            }
            if let (Some(last), Some(checkpoint)) = (history.last_day(), store.checkpoint) {
                if last > checkpoint {
                    return Err(ProcessingError::InvalidFormat(format!(
                        "Series {} has entries after checkpoint {}",
                        key, checkpoint
                    )));
                }
            }
            store.series.insert(key, history);
        }

        Ok(store)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub capacity: u32,
    pub checkpoint: Option<NaiveDate>,
    pub series: Vec<SeriesSnapshot>,
    #[serde(default)]
    pub halted: Vec<SensorKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub key: SensorKey,
    pub entries: Vec<HistoryEntry>,
}
