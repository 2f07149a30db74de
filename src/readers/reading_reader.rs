use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{ProcessingError, Result};
use crate::models::RawReading;
use crate::utils::constants::SOURCE_DELIMITER;

/// Parses LCSQA daily measurement files into raw readings.
pub struct ReadingReader {
    delimiter: u8,
}

impl ReadingReader {
    pub fn new() -> Self {
        Self {
            delimiter: SOURCE_DELIMITER,
        }
    }

    pub fn read_path(&self, path: &Path) -> Result<Vec<RawReading>> {
        let bytes = fs::read(path)?;
        self.read_bytes(&bytes)
    }

    /// Parse a whole file. Files that are not valid UTF-8 are read as Windows-1252.
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<Vec<RawReading>> {
        let text = decode(bytes);
        let text = text.trim_start_matches('\u{feff}');

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        for required in ["code site", "Polluant", "Date de début"] {
            if !headers.iter().any(|h| h == required) {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Missing column '{}' in daily file",
                    required
                )));
            }
        }

        let mut readings = Vec::new();
        for (line, result) in reader.deserialize::<RawReading>().enumerate() {
            match result {
                Ok(reading) => readings.push(reading),
                Err(e) => warn!(line = line + 2, error = %e, "skipping unreadable row"),
            }
        }
        Ok(readings)
    }
}

impl Default for ReadingReader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text
        }
    }
}
