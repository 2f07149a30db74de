use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Pollutant;

/// One row of a daily source file, before any interpretation.
///
/// Field names follow the LCSQA `FR_E2_*.csv` headers; every field is kept as text so that a
/// single malformed cell does not reject the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(rename = "code site")]
    pub station_code: String,

    #[serde(rename = "nom site", default)]
    pub station_name: String,

    #[serde(rename = "Polluant")]
    pub pollutant: String,

    #[serde(rename = "Date de début")]
    pub start_time: String,

    #[serde(rename = "valeur brute", default)]
    pub value: String,

    #[serde(rename = "validité", default)]
    pub validity: String,
}

impl RawReading {
    pub fn new(
        station_code: &str,
        pollutant: &str,
        start_time: &str,
        value: &str,
        validity: &str,
    ) -> Self {
        Self {
            station_code: station_code.to_string(),
            station_name: String::new(),
            pollutant: pollutant.to_string(),
            start_time: start_time.to_string(),
            value: value.to_string(),
            validity: validity.to_string(),
        }
    }
}

/// Canonical hourly reading produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station: String,
    pub pollutant: Pollutant,
    pub hour: u8,
    pub day: NaiveDate,
    pub value: f64,
    pub valid: bool,
}

impl Reading {
    pub fn new(
        station: String,
        pollutant: Pollutant,
        hour: u8,
        day: NaiveDate,
        value: f64,
        valid: bool,
    ) -> Self {
        Self {
            station,
            pollutant,
            hour,
            day,
            value,
            valid,
        }
    }
}
