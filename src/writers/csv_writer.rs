use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::processors::HourlyAverages;
use crate::utils::constants::SOURCE_DELIMITER;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub hour: u8,
    pub value: f64,
    pub band: String,
}

/// Writes hourly averages as `hour;value;band` rows.
pub struct CsvWriter {
    delimiter: u8,
    precision: usize,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self {
            delimiter: SOURCE_DELIMITER,
            precision: 2,
        }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn rows(&self, averages: &HourlyAverages) -> Vec<ExportRow> {
        let factor = 10f64.powi(self.precision as i32);
        averages
            .values
            .iter()
            .map(|(hour, value)| ExportRow {
                hour: *hour,
                value: (value * factor).round() / factor,
                band: averages.pollutant.exposure_band(*value).label().to_string(),
            })
            .collect()
    }

    /// Writes one file, creating parent directories. Returns the number of rows written.
    pub fn write_averages(&self, averages: &HourlyAverages, path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        let rows = self.rows(averages);
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(rows.len())
    }

    pub fn read_rows(&self, path: &Path) -> Result<Vec<ExportRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}
