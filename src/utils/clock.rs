use chrono::{Local, NaiveDate};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "today" for the advancer and the query window.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    fn yesterday(&self) -> NaiveDate {
        self.today().pred_opt().unwrap_or(NaiveDate::MIN)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a given day, movable from tests or replays.
#[derive(Debug)]
pub struct FixedClock {
    days_from_ce: AtomicI64,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            days_from_ce: AtomicI64::new(Self::encode(today)),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        self.days_from_ce.store(Self::encode(today), Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.days_from_ce.fetch_add(days, Ordering::SeqCst);
    }

    fn encode(day: NaiveDate) -> i64 {
        use chrono::Datelike;
        day.num_days_from_ce() as i64
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        let days = self.days_from_ce.load(Ordering::SeqCst);
        NaiveDate::from_num_days_from_ce_opt(days as i32).unwrap_or(NaiveDate::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(clock.yesterday(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        clock.advance_days(2);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());

        clock.set(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }
}
