use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;

/// Regulated pollutants published in the LCSQA real-time files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "O3")]
    Ozone,
    #[serde(rename = "NO2")]
    NitrogenDioxide,
    #[serde(rename = "SO2")]
    SulphurDioxide,
    #[serde(rename = "PM2.5")]
    FineParticles,
    #[serde(rename = "PM10")]
    Particles,
    #[serde(rename = "CO")]
    CarbonMonoxide,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Ozone,
        Pollutant::NitrogenDioxide,
        Pollutant::SulphurDioxide,
        Pollutant::FineParticles,
        Pollutant::Particles,
        Pollutant::CarbonMonoxide,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "O3" => Some(Pollutant::Ozone),
            "NO2" => Some(Pollutant::NitrogenDioxide),
            "SO2" => Some(Pollutant::SulphurDioxide),
            "PM2.5" | "PM25" => Some(Pollutant::FineParticles),
            "PM10" => Some(Pollutant::Particles),
            "CO" => Some(Pollutant::CarbonMonoxide),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Pollutant::Ozone => "O3",
            Pollutant::NitrogenDioxide => "NO2",
            Pollutant::SulphurDioxide => "SO2",
            Pollutant::FineParticles => "PM2.5",
            Pollutant::Particles => "PM10",
            Pollutant::CarbonMonoxide => "CO",
        }
    }

    /// Name used in the source files and in the wizard.
    pub fn display_name(&self) -> &'static str {
        match self {
            Pollutant::Ozone => "ozone",
            Pollutant::NitrogenDioxide => "dioxyde d'azote",
            Pollutant::SulphurDioxide => "dioxyde de soufre",
            Pollutant::FineParticles => "particules fines",
            Pollutant::Particles => "particules",
            Pollutant::CarbonMonoxide => "monoxyde de carbone",
        }
    }

    /// WHO recommended daily mean concentration.
    pub fn guideline(&self) -> f64 {
        match self {
            Pollutant::Ozone => 100.0,
            Pollutant::NitrogenDioxide => 25.0,
            Pollutant::SulphurDioxide => 40.0,
            Pollutant::FineParticles => 15.0,
            Pollutant::Particles => 45.0,
            Pollutant::CarbonMonoxide => 4.0,
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Pollutant::CarbonMonoxide => "mg/m³",
            _ => "µg/m³",
        }
    }

    /// Band thresholds at 1/3, 2/3, 3/3 and 4/3 of the guideline.
    pub fn band_thresholds(&self) -> [f64; 4] {
        let g = self.guideline();
        [g / 3.0, 2.0 * g / 3.0, g, 4.0 * g / 3.0]
    }

    pub fn exposure_band(&self, value: f64) -> ExposureBand {
        let [t1, t2, t3, t4] = self.band_thresholds();
        if value <= t1 {
            ExposureBand::Good
        } else if value <= t2 {
            ExposureBand::Fair
        } else if value <= t3 {
            ExposureBand::Moderate
        } else if value <= t4 {
            ExposureBand::Poor
        } else {
            ExposureBand::VeryPoor
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Pollutant {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pollutant::from_code(s)
            .ok_or_else(|| ProcessingError::InvalidFormat(format!("Unknown pollutant code: '{}'", s)))
    }
}

/// Position of an average concentration relative to the WHO guideline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExposureBand {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl ExposureBand {
    pub fn label(&self) -> &'static str {
        match self {
            ExposureBand::Good => "good",
            ExposureBand::Fair => "fair",
            ExposureBand::Moderate => "moderate",
            ExposureBand::Poor => "above guideline",
            ExposureBand::VeryPoor => "far above guideline",
        }
    }

    pub fn exceeds_guideline(&self) -> bool {
        matches!(self, ExposureBand::Poor | ExposureBand::VeryPoor)
    }
}

impl fmt::Display for ExposureBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pollutant_from_code() {
        assert_eq!(Pollutant::from_code("NO2"), Some(Pollutant::NitrogenDioxide));
        assert_eq!(Pollutant::from_code("pm2.5"), Some(Pollutant::FineParticles));
        assert_eq!(Pollutant::from_code(" PM10 "), Some(Pollutant::Particles));
        assert_eq!(Pollutant::from_code("C6H6"), None);
        assert!("XX".parse::<Pollutant>().is_err());
    }

    #[test]
    fn test_code_round_trip_for_catalogue() {
        for pollutant in Pollutant::ALL {
            assert_eq!(Pollutant::from_code(pollutant.code()), Some(pollutant));
        }
    }

    #[test]
    fn test_serde_uses_source_codes() {
        let json = serde_json::to_string(&Pollutant::FineParticles).unwrap();
        assert_eq!(json, "\"PM2.5\"");
        let back: Pollutant = serde_json::from_str("\"O3\"").unwrap();
        assert_eq!(back, Pollutant::Ozone);
    }

    #[test]
    fn test_exposure_bands() {
        // NO2 guideline is 25: thresholds at 8.33, 16.67, 25, 33.33
        let no2 = Pollutant::NitrogenDioxide;
        assert_eq!(no2.exposure_band(0.0), ExposureBand::Good);
        assert_eq!(no2.exposure_band(10.0), ExposureBand::Fair);
        assert_eq!(no2.exposure_band(25.0), ExposureBand::Moderate);
        assert_eq!(no2.exposure_band(30.0), ExposureBand::Poor);
        assert_eq!(no2.exposure_band(50.0), ExposureBand::VeryPoor);
        assert!(no2.exposure_band(30.0).exceeds_guideline());
        assert!(!no2.exposure_band(25.0).exceeds_guideline());
    }
}
