use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;
use validator::Validate;

use crate::error::Result;
use crate::models::{Pollutant, StationDirectory, StationMetadata};
use crate::utils::constants::SOURCE_DELIMITER;

#[derive(Debug, Deserialize)]
struct StationRow {
    region: String,
    department: String,
    city: String,
    code: String,
    name: String,
    #[serde(default)]
    zone: String,
    #[serde(default)]
    pollutants: String,
}

pub struct StationReader {
    delimiter: u8,
}

impl StationReader {
    pub fn new() -> Self {
        Self {
            delimiter: SOURCE_DELIMITER,
        }
    }

    /// Read station metadata from the directory file
    pub fn read_stations(&self, path: &Path) -> Result<Vec<StationMetadata>> {
        let bytes = fs::read(path)?;
        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text.to_string(),
            Err(_) => encoding_rs::WINDOWS_1252.decode(&bytes).0.into_owned(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

        let mut stations = Vec::new();
        for (line, row) in reader.deserialize::<StationRow>().enumerate() {
            let row = row?;
            let station = StationMetadata::new(
                row.code,
                row.name,
                row.zone,
                row.city,
                row.department,
                row.region,
            )
            .with_pollutants(parse_pollutants(&row.pollutants));

            // Skip malformed rows, the directory is curated by hand
            if let Err(e) = station.validate() {
                warn!(line = line + 2, error = %e, "skipping invalid station row");
                continue;
            }
            stations.push(station);
        }

        Ok(stations)
    }

    pub fn read_directory(&self, path: &Path) -> Result<StationDirectory> {
        Ok(StationDirectory::from_stations(self.read_stations(path)?))
    }
}

impl Default for StationReader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_pollutants(field: &str) -> Vec<Pollutant> {
    let mut pollutants: Vec<Pollutant> = field
        .split(['|', ','])
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .filter_map(|code| {
            let pollutant = Pollutant::from_code(code);
            if pollutant.is_none() {
                warn!(code, "ignoring unknown pollutant in station directory");
            }
            pollutant
        })
        .collect();
    pollutants.sort();
    pollutants.dedup();
    pollutants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StationLookup;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_stations_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "region;department;city;code;name;zone;pollutants")?;
        writeln!(
            temp_file,
            "ILE-DE-FRANCE;PARIS;Paris;FR04143;Paris 18eme;urbaine;NO2|O3|PM10"
        )?;
        writeln!(temp_file, "GUYANE;GUYANE;Cayenne;FR39001;Cayenne Centre;urbaine;")?;
        writeln!(temp_file, "BRETAGNE;FINISTERE;Brest;;Sans code;;")?;

        let reader = StationReader::new();
        let stations = reader.read_stations(temp_file.path())?;

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].code, "FR04143");
        assert_eq!(
            stations[0].pollutants,
            vec![Pollutant::Ozone, Pollutant::NitrogenDioxide, Pollutant::Particles]
        );
        assert!(stations[1].pollutants.is_empty());
        assert!(stations[1].is_overseas());
        Ok(())
    }

    #[test]
    fn test_read_directory() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "region;department;city;code;name")?;
        writeln!(temp_file, "OCCITANIE;HAUTE-GARONNE;Toulouse;FR12004;Toulouse Berthelot")?;

        let directory = StationReader::new().read_directory(temp_file.path())?;
        assert!(directory.resolve_station("FR12004"));
        assert_eq!(directory.cities("OCCITANIE", "HAUTE-GARONNE"), vec!["Toulouse"]);
        Ok(())
    }

    #[test]
    fn test_parse_pollutants() {
        assert_eq!(
            parse_pollutants("PM2.5, NO2 |PM2.5|XYZ"),
            vec![Pollutant::NitrogenDioxide, Pollutant::FineParticles]
        );
        assert!(parse_pollutants("").is_empty());
    }
}
