use chrono::NaiveDate;
use std::collections::HashSet;

use crate::models::Reading;
use crate::store::SensorKey;

/// One calendar day of readings, ready to be folded into the store.
///
/// Only valid readings dated `day` are kept, and only the first value seen for a key.
#[derive(Debug, Clone, Default)]
pub struct DayBatch {
    pub day: NaiveDate,
    pub values: Vec<(SensorKey, f64)>,
    pub dropped_invalid: usize,
    pub dropped_duplicates: usize,
    pub dropped_misdated: usize,
}

impl DayBatch {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            ..Self::default()
        }
    }

    pub fn from_readings<'a, I>(day: NaiveDate, readings: I) -> Self
    where
        I: IntoIterator<Item = &'a Reading>,
    {
        let mut batch = Self::empty(day);
        let mut seen = HashSet::new();

        for reading in readings {
            if !reading.valid {
                batch.dropped_invalid += 1;
                continue;
            }
            if reading.day != day {
                batch.dropped_misdated += 1;
                continue;
            }

            let key = SensorKey::new(reading.station.clone(), reading.pollutant, reading.hour);
            if seen.insert(key.clone()) {
                batch.values.push((key, reading.value));
            } else {
                batch.dropped_duplicates += 1;
            }
        }

        batch
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped_invalid + self.dropped_duplicates + self.dropped_misdated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pollutant;

    fn reading(hour: u8, day: NaiveDate, value: f64, valid: bool) -> Reading {
        Reading::new(
            "FR04143".to_string(),
            Pollutant::NitrogenDioxide,
            hour,
            day,
            value,
            valid,
        )
    }

    #[test]
    fn test_first_reading_wins() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let readings = vec![
            reading(7, day, 12.0, true),
            reading(7, day, 99.0, true),
            reading(8, day, 15.0, true),
        ];

        let batch = DayBatch::from_readings(day, &readings);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.values[0].1, 12.0);
        assert_eq!(batch.dropped_duplicates, 1);
    }

    #[test]
    fn test_invalid_reading_does_not_claim_the_key() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let readings = vec![reading(7, day, 500.0, false), reading(7, day, 12.0, true)];

        let batch = DayBatch::from_readings(day, &readings);

        assert_eq!(batch.values.len(), 1);
        assert_eq!(batch.values[0].1, 12.0);
        assert_eq!(batch.dropped_invalid, 1);
    }

    #[test]
    fn test_misdated_readings_are_dropped() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let other = day.succ_opt().unwrap();
        let readings = vec![reading(0, other, 1.0, true)];

        let batch = DayBatch::from_readings(day, &readings);

        assert!(batch.is_empty());
        assert_eq!(batch.dropped_misdated, 1);
        assert_eq!(batch.dropped(), 1);
    }
}
