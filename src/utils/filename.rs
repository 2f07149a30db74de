use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;

use crate::models::Pollutant;
use crate::utils::constants::{SOURCE_FILE_EXTENSION, SOURCE_FILE_PREFIX};

/// Daily source file name: FR_E2_{YYYY-MM-DD}.csv
pub fn daily_file_name(day: NaiveDate) -> String {
    format!(
        "{}{}.{}",
        SOURCE_FILE_PREFIX,
        day.format("%Y-%m-%d"),
        SOURCE_FILE_EXTENSION
    )
}

/// Remote location of a daily file: {base_url}/{YYYY}/FR_E2_{YYYY-MM-DD}.csv
pub fn daily_file_url(base_url: &str, day: NaiveDate) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        day.year(),
        daily_file_name(day)
    )
}

/// Default export file: output/airq-{station}-{pollutant}-{YYMMDD}.csv
pub fn default_export_filename(station: &str, pollutant: Pollutant, today: NaiveDate) -> PathBuf {
    let code = pollutant.code().replace('.', "");
    let filename = format!(
        "airq-{}-{}-{:02}{:02}{:02}.csv",
        station,
        code,
        today.year() % 100,
        today.month(),
        today.day()
    );
    PathBuf::from("output").join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_file_naming() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(daily_file_name(day), "FR_E2_2024-03-05.csv");
        assert_eq!(
            daily_file_url("https://example.org/temps-reel/", day),
            "https://example.org/temps-reel/2024/FR_E2_2024-03-05.csv"
        );
    }

    #[test]
    fn test_default_export_filename() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let path = default_export_filename("FR04143", Pollutant::FineParticles, day);
        assert_eq!(path, PathBuf::from("output").join("airq-FR04143-PM25-240305.csv"));
    }
}
