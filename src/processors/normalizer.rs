use chrono::{NaiveDateTime, Timelike};
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::models::{Pollutant, RawReading, Reading};
use crate::utils::constants::{SOURCE_TIMESTAMP_FORMAT, SOURCE_VALID_FLAG};

/// Why a raw record could not become a canonical reading.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeIssue {
    UnknownPollutant(String),
    BadTimestamp(String),
    BadValue(String),
    MissingStation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub flagged_invalid: usize,
    pub unknown_pollutant: usize,
    pub malformed_records: usize,
    pub unknown_pollutant_codes: BTreeSet<String>,
}

impl NormalizationReport {
    fn record(&mut self, outcome: &Result<Reading, NormalizeIssue>) {
        self.total_records += 1;
        match outcome {
            Ok(reading) if reading.valid => self.valid_records += 1,
            Ok(_) => self.flagged_invalid += 1,
            Err(NormalizeIssue::UnknownPollutant(code)) => {
                self.unknown_pollutant += 1;
                self.unknown_pollutant_codes.insert(code.clone());
            }
            Err(_) => self.malformed_records += 1,
        }
    }

    pub fn merge(&mut self, other: &NormalizationReport) {
        self.total_records += other.total_records;
        self.valid_records += other.valid_records;
        self.flagged_invalid += other.flagged_invalid;
        self.unknown_pollutant += other.unknown_pollutant;
        self.malformed_records += other.malformed_records;
        self.unknown_pollutant_codes
            .extend(other.unknown_pollutant_codes.iter().cloned());
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Records: {}\n", self.total_records));
        summary.push_str(&format!("  valid: {}\n", self.valid_records));
        summary.push_str(&format!("  flagged invalid: {}\n", self.flagged_invalid));
        summary.push_str(&format!(
            "  other pollutants: {}{}\n",
            self.unknown_pollutant,
            if self.unknown_pollutant_codes.is_empty() {
                String::new()
            } else {
                format!(
                    " ({})",
                    self.unknown_pollutant_codes
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        ));
        summary.push_str(&format!("  malformed: {}\n", self.malformed_records));
        summary
    }
}

/// Maps source records onto `{station, pollutant, hour, day, value, valid}`.
pub struct Normalizer {
    parallel_threshold: usize,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            parallel_threshold: 10_000,
        }
    }

    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Records whose validity flag is not set come back with `valid == false`.
    /// Their value may be NaN when the source left it blank.
    pub fn normalize(&self, raw: &RawReading) -> Result<Reading, NormalizeIssue> {
        let station = raw.station_code.trim();
        if station.is_empty() {
            return Err(NormalizeIssue::MissingStation);
        }

        let pollutant = Pollutant::from_code(&raw.pollutant)
            .ok_or_else(|| NormalizeIssue::UnknownPollutant(raw.pollutant.trim().to_string()))?;

        let start = NaiveDateTime::parse_from_str(raw.start_time.trim(), SOURCE_TIMESTAMP_FORMAT)
            .map_err(|_| NormalizeIssue::BadTimestamp(raw.start_time.clone()))?;

        let valid = raw.validity.trim() == SOURCE_VALID_FLAG;
        let value = match parse_value(&raw.value) {
            Some(value) => value,
            None if !valid => f64::NAN,
            None => return Err(NormalizeIssue::BadValue(raw.value.clone())),
        };

        Ok(Reading::new(
            station.to_string(),
            pollutant,
            start.hour() as u8,
            start.date(),
            value,
            valid,
        ))
    }

    /// Normalizes a whole file, in parallel past the threshold. Output keeps input order.
    pub fn normalize_batch(&self, raw: &[RawReading]) -> (Vec<Reading>, NormalizationReport) {
        let outcomes: Vec<Result<Reading, NormalizeIssue>> = if raw.len() >= self.parallel_threshold {
            raw.par_iter().map(|r| self.normalize(r)).collect()
        } else {
            raw.iter().map(|r| self.normalize(r)).collect()
        };

        let mut report = NormalizationReport::default();
        let mut readings = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            report.record(&outcome);
            if let Ok(reading) = outcome {
                readings.push(reading);
            }
        }
        (readings, report)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_value(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
