use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ProcessingError, Result};
use crate::models::{ExposureBand, Pollutant, StationLookup};
use crate::store::{HistoryStore, SensorKey, SharedStore};
use crate::utils::clock::Clock;
use crate::utils::constants::HOURS_PER_DAY;

/// Average concentration for each hour of the day over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyAverages {
    pub station: String,
    pub pollutant: Pollutant,
    pub n_days: u32,
    pub values: BTreeMap<u8, f64>,
    /// Hours that had at least one reading in the window
    pub hours_with_data: usize,
}

impl HourlyAverages {
    /// The 24 values in hour order.
    pub fn ordered_values(&self) -> Vec<f64> {
        self.values.values().copied().collect()
    }

    pub fn value(&self, hour: u8) -> f64 {
        self.values.get(&hour).copied().unwrap_or(0.0)
    }

    pub fn bands(&self) -> BTreeMap<u8, ExposureBand> {
        self.values
            .iter()
            .map(|(hour, value)| (*hour, self.pollutant.exposure_band(*value)))
            .collect()
    }

    pub fn peak(&self) -> Option<(u8, f64)> {
        self.values
            .iter()
            .map(|(hour, value)| (*hour, *value))
            .fold(None, |best, (hour, value)| match best {
                Some((_, v)) if v >= value => best,
                _ => Some((hour, value)),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub station: String,
    pub pollutant: String,
    pub n_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub detail: String,
}

impl ErrorResponse {
    /// Caller-facing form of a rejected query; internal failures map to 500.
    pub fn from_error(error: &ProcessingError) -> Self {
        Self {
            status: error.http_status().unwrap_or(500),
            detail: error.to_string(),
        }
    }
}

/// Answers hour-of-day averages against the current store state.
pub struct QueryService {
    store: SharedStore,
    directory: Arc<dyn StationLookup>,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    pub fn new(store: SharedStore, directory: Arc<dyn StationLookup>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    pub async fn hourly_averages(
        &self,
        station: &str,
        pollutant: &str,
        n_days: u32,
    ) -> Result<HourlyAverages> {
        let store = self.store.read().await;
        self.averages_from(&store, station, pollutant, n_days)
    }

    /// One result per pollutant, all read from the same store state.
    pub async fn hourly_averages_many(
        &self,
        station: &str,
        pollutants: &[&str],
        n_days: u32,
    ) -> Result<Vec<HourlyAverages>> {
        let store = self.store.read().await;
        pollutants
            .iter()
            .map(|pollutant| self.averages_from(&store, station, pollutant, n_days))
            .collect()
    }

    pub async fn respond(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let averages = self
            .hourly_averages(&request.station, &request.pollutant, request.n_days)
            .await?;
        Ok(QueryResponse {
            values: averages.ordered_values(),
        })
    }

    fn averages_from(
        &self,
        store: &HistoryStore,
        station: &str,
        pollutant_code: &str,
        n_days: u32,
    ) -> Result<HourlyAverages> {
        if !self.directory.resolve_station(station) {
            return Err(ProcessingError::UnknownStation {
                station_id: station.to_string(),
            });
        }

        let unknown_pollutant = || ProcessingError::UnknownPollutant {
            station_id: station.to_string(),
            code: pollutant_code.to_string(),
        };
        let pollutant = Pollutant::from_code(pollutant_code).ok_or_else(unknown_pollutant)?;

        let mut monitored = self.directory.monitored_pollutants(station);
        if monitored.is_empty() {
            monitored = store.observed_pollutants(station);
        }
        if !monitored.contains(&pollutant) {
            return Err(unknown_pollutant());
        }

        let capacity = store.capacity();
        if n_days < 1 || n_days > capacity {
            return Err(ProcessingError::InvalidWindow { n_days, capacity });
        }

        let today = self.clock.today();
        let mut values = BTreeMap::new();
        let mut hours_with_data = 0;
        for hour in 0..HOURS_PER_DAY {
            let key = SensorKey::new(station, pollutant, hour);
            let average = store.windowed_average(&key, n_days, today);
            if average.is_some() {
                hours_with_data += 1;
            }
            values.insert(hour, average.unwrap_or(0.0));
        }

        Ok(HourlyAverages {
            station: station.to_string(),
            pollutant,
            n_days,
            values,
            hours_with_data,
        })
    }
}
