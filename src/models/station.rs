use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Pollutant;
use crate::utils::constants::{OVERSEAS_REGION, OVERSEAS_TERRITORIES};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StationMetadata {
    #[validate(length(min = 1, max = 16))]
    pub code: String,

    #[validate(length(min = 1))]
    pub name: String,

    pub zone: String,

    #[validate(length(min = 1))]
    pub city: String,

    #[validate(length(min = 1))]
    pub department: String,

    #[validate(length(min = 1))]
    pub region: String,

    /// Pollutants the network declares for this station; empty when unknown.
    #[serde(default)]
    pub pollutants: Vec<Pollutant>,
}

impl StationMetadata {
    pub fn new(
        code: String,
        name: String,
        zone: String,
        city: String,
        department: String,
        region: String,
    ) -> Self {
        Self {
            code,
            name,
            zone,
            city,
            department,
            region,
            pollutants: Vec::new(),
        }
    }

    pub fn with_pollutants(mut self, pollutants: Vec<Pollutant>) -> Self {
        self.pollutants = pollutants;
        self
    }

    pub fn is_overseas(&self) -> bool {
        let region = self.region.to_uppercase();
        OVERSEAS_TERRITORIES.iter().any(|t| *t == region)
    }

    /// Region under which the station is listed when browsing the directory.
    pub fn browse_region(&self) -> &str {
        if self.is_overseas() {
            OVERSEAS_REGION
        } else {
            &self.region
        }
    }

    /// Label shown in station pickers, e.g. `Paris 18eme (zone urbaine) FR04143`.
    pub fn label(&self) -> String {
        if self.zone.is_empty() {
            format!("{} {}", self.name, self.code)
        } else {
            format!("{} (zone {}) {}", self.name, self.zone, self.code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> StationMetadata {
        StationMetadata::new(
            "FR04143".to_string(),
            "Paris 18eme".to_string(),
            "urbaine".to_string(),
            "Paris".to_string(),
            "PARIS".to_string(),
            "ILE-DE-FRANCE".to_string(),
        )
    }

    #[test]
    fn test_station_validation() {
        let station = paris();
        assert!(station.validate().is_ok());
        assert!(!station.is_overseas());
        assert_eq!(station.browse_region(), "ILE-DE-FRANCE");
        assert_eq!(station.label(), "Paris 18eme (zone urbaine) FR04143");
    }

    #[test]
    fn test_invalid_station() {
        let mut station = paris();
        station.code = String::new();
        assert!(station.validate().is_err());
    }

    #[test]
    fn test_overseas_station_grouping() {
        let mut station = paris();
        station.region = "Guadeloupe".to_string();
        assert!(station.is_overseas());
        assert_eq!(station.browse_region(), OVERSEAS_REGION);
    }
}
