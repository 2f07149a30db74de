use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{Pollutant, StationMetadata};

/// Station existence and pollutant coverage, as needed by the query path.
pub trait StationLookup: Send + Sync {
    fn resolve_station(&self, code: &str) -> bool;

    fn monitored_pollutants(&self, code: &str) -> BTreeSet<Pollutant>;
}

/// Region → department → city → station directory.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    stations: HashMap<String, StationMetadata>,
    hierarchy: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>,
}

impl StationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stations(stations: Vec<StationMetadata>) -> Self {
        let mut directory = Self::new();
        for station in stations {
            directory.insert(station);
        }
        directory
    }

    pub fn insert(&mut self, station: StationMetadata) {
        let cities = self
            .hierarchy
            .entry(station.browse_region().to_string())
            .or_default()
            .entry(station.department.clone())
            .or_default();
        let codes = cities.entry(station.city.clone()).or_default();
        if !codes.contains(&station.code) {
            codes.push(station.code.clone());
            codes.sort();
        }
        self.stations.insert(station.code.clone(), station);
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn station(&self, code: &str) -> Option<&StationMetadata> {
        self.stations.get(code)
    }

    pub fn regions(&self) -> Vec<&str> {
        self.hierarchy.keys().map(String::as_str).collect()
    }

    pub fn departments(&self, region: &str) -> Vec<&str> {
        self.hierarchy
            .get(region)
            .map(|departments| departments.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn cities(&self, region: &str, department: &str) -> Vec<&str> {
        self.hierarchy
            .get(region)
            .and_then(|departments| departments.get(department))
            .map(|cities| cities.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Stations of one city. Cities are keyed by their full path since names repeat
    /// across departments.
    pub fn stations(&self, region: &str, department: &str, city: &str) -> Vec<&StationMetadata> {
        self.hierarchy
            .get(region)
            .and_then(|departments| departments.get(department))
            .and_then(|cities| cities.get(city))
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|code| self.stations.get(code))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl StationLookup for StationDirectory {
    fn resolve_station(&self, code: &str) -> bool {
        self.stations.contains_key(code)
    }

    fn monitored_pollutants(&self, code: &str) -> BTreeSet<Pollutant> {
        self.stations
            .get(code)
            .map(|s| s.pollutants.iter().copied().collect())
            .unwrap_or_default()
    }
}
