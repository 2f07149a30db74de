use chrono::{Duration, NaiveDate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{ProcessingError, Result};
use crate::processors::{NormalizationReport, Normalizer};
use crate::readers::DailyReadingFetcher;
use crate::store::{DayBatch, FoldSummary, HistoryStore, SharedStore, StorePersistence};
use crate::utils::clock::Clock;
use crate::utils::constants::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::utils::progress::ProgressReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancerState {
    Uninitialized,
    Advancing { checkpoint: NaiveDate },
}

/// A day that could not be fetched or normalized; the next tick starts again from it.
#[derive(Debug, Clone, PartialEq)]
pub struct DayFailure {
    pub day: NaiveDate,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct AdvanceReport {
    pub folded: Vec<FoldSummary>,
    /// Days left as gaps during initialization
    pub skipped_days: Vec<DayFailure>,
    pub pending: Option<DayFailure>,
    pub cancelled: bool,
    pub checkpoint: Option<NaiveDate>,
    pub normalization: NormalizationReport,
}

impl AdvanceReport {
    pub fn days_folded(&self) -> usize {
        self.folded.len()
    }

    pub fn readings_appended(&self) -> usize {
        self.folded.iter().map(|f| f.appended).sum()
    }

    pub fn is_up_to_date(&self, target: NaiveDate) -> bool {
        self.checkpoint.is_some_and(|c| c >= target)
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("=== Advance Report ===\n");
        summary.push_str(&format!("Days folded: {}\n", self.days_folded()));
        summary.push_str(&format!("Readings appended: {}\n", self.readings_appended()));
        match self.checkpoint {
            Some(day) => summary.push_str(&format!("Checkpoint: {}\n", day)),
            None => summary.push_str("Checkpoint: none\n"),
        }
        if !self.skipped_days.is_empty() {
            summary.push_str(&format!("Days left empty: {}\n", self.skipped_days.len()));
            for failure in self.skipped_days.iter().take(10) {
                summary.push_str(&format!("  {}: {}\n", failure.day, failure.error));
            }
        }
        if let Some(ref pending) = self.pending {
            summary.push_str(&format!(
                "Stopped at {} (will retry): {}\n",
                pending.day, pending.error
            ));
        }
        if self.cancelled {
            summary.push_str("Cancelled before catching up\n");
        }
        summary.push_str(&self.normalization.summary());
        summary
    }
}

/// Folds missing days into the store, one calendar day at a time.
///
/// Only one tick runs at a time. Fetching and normalizing happen outside the store lock;
/// the write lock is held only while a day is folded, so readers never see half a day.
pub struct WindowAdvancer<F> {
    store: SharedStore,
    fetcher: F,
    normalizer: Normalizer,
    clock: Arc<dyn Clock>,
    persistence: Option<StorePersistence>,
    fetch_timeout: std::time::Duration,
    tick: Mutex<()>,
    cancelled: Arc<AtomicBool>,
}

impl<F: DailyReadingFetcher> WindowAdvancer<F> {
    pub fn new(store: SharedStore, fetcher: F, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            fetcher,
            normalizer: Normalizer::new(),
            clock,
            persistence: None,
            fetch_timeout: std::time::Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            tick: Mutex::new(()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_persistence(mut self, persistence: StorePersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: std::time::Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Flag checked between days. Once set, ticks stop until `resume` is called.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> AdvancerState {
        match self.store.read().await.checkpoint() {
            Some(checkpoint) => AdvancerState::Advancing { checkpoint },
            None => AdvancerState::Uninitialized,
        }
    }

    /// Last day a tick should fold: yesterday.
    pub fn target_day(&self) -> NaiveDate {
        self.clock.yesterday()
    }

    /// Days between the checkpoint and yesterday; `None` before initialization.
    pub async fn lag_days(&self) -> Option<i64> {
        let checkpoint = self.store.read().await.checkpoint()?;
        Some((self.target_day() - checkpoint).num_days().max(0))
    }

    /// Rebuilds the store from the `capacity` days ending yesterday, oldest first.
    ///
    /// Days that cannot be fetched are left as gaps. The checkpoint follows every day, so an
    /// interrupted initialization is completed by `advance`. The existing store is replaced
    /// only when the first day is folded; cancelling or failing before that leaves it as is.
    pub async fn initialize(
        &self,
        capacity: u32,
        progress: Option<&ProgressReporter>,
    ) -> Result<AdvanceReport> {
        let _tick = self.tick.lock().await;
        let mut replacement = Some(HistoryStore::new(capacity)?);

        let end = self.target_day();
        let start = end - Duration::days(capacity as i64 - 1);
        info!(%start, %end, capacity, "initializing history store");

        let mut report = AdvanceReport::default();
        let mut day = start;
        while day <= end {
            if self.is_cancelled() {
                report.cancelled = true;
                if replacement.is_some() {
                    report.checkpoint = self.store.read().await.checkpoint();
                }
                break;
            }

            let batch = match self.load_day(day, &mut report).await {
                Ok(batch) => batch,
                Err(e) if e.is_retryable() => {
                    warn!(%day, error = %e, "no data for day, leaving a gap");
                    if let Some(p) = progress {
                        p.day_skipped(day, &e.to_string());
                    }
                    report.skipped_days.push(DayFailure {
                        day,
                        error: e.to_string(),
                    });
                    DayBatch::empty(day)
                }
                Err(e) => return Err(e),
            };

            let summary = self.fold(&batch, replacement.take()).await?;
            if let Some(p) = progress {
                if report.skipped_days.last().map(|f| f.day) != Some(day) {
                    p.day_folded(day, summary.appended);
                }
            }
            report.folded.push(summary);
            report.checkpoint = Some(day);

            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        Ok(report)
    }

    pub async fn advance(&self) -> Result<AdvanceReport> {
        self.advance_with_progress(None).await
    }

    /// Folds every day after the checkpoint up to yesterday.
    ///
    /// A day that cannot be fetched stops the tick with the checkpoint on the previous day;
    /// an ordering violation in the store is returned as an error.
    pub async fn advance_with_progress(
        &self,
        progress: Option<&ProgressReporter>,
    ) -> Result<AdvanceReport> {
        let _tick = self.tick.lock().await;
        let target = self.target_day();
        let mut report = AdvanceReport::default();

        loop {
            let checkpoint = self
                .store
                .read()
                .await
                .checkpoint()
                .ok_or(ProcessingError::NotInitialized)?;
            report.checkpoint = Some(checkpoint);

            if checkpoint >= target {
                break;
            }
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let Some(day) = checkpoint.succ_opt() else {
                break;
            };

            match self.load_day(day, &mut report).await {
                Ok(batch) => {
                    let summary = self.fold(&batch, None).await?;
                    if let Some(p) = progress {
                        p.day_folded(day, summary.appended);
                    }
                    report.folded.push(summary);
                    report.checkpoint = Some(day);
                }
                Err(e) if e.is_retryable() => {
                    warn!(%day, error = %e, "stopping tick, day will be retried");
                    report.pending = Some(DayFailure {
                        day,
                        error: e.to_string(),
                    });
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Advances only when the checkpoint is behind yesterday.
    pub async fn ensure_fresh(&self) -> Result<Option<AdvanceReport>> {
        match self.lag_days().await {
            None => Err(ProcessingError::NotInitialized),
            Some(0) => Ok(None),
            Some(_) => self.advance().await.map(Some),
        }
    }

    async fn load_day(&self, day: NaiveDate, report: &mut AdvanceReport) -> Result<DayBatch> {
        let raw = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(day))
            .await
            .map_err(|_| ProcessingError::FetchTimeout {
                day,
                seconds: self.fetch_timeout.as_secs(),
            })??;

        let (readings, normalization) = self.normalizer.normalize_batch(&raw);
        report.normalization.merge(&normalization);
        Ok(DayBatch::from_readings(day, &readings))
    }

    /// Folds one day under the write lock, first swapping in `replacement` when given.
    /// The snapshot is written after the lock is released.
    async fn fold(
        &self,
        batch: &DayBatch,
        replacement: Option<HistoryStore>,
    ) -> Result<FoldSummary> {
        let (summary, snapshot) = {
            let mut store = self.store.write().await;
            let previous = replacement.map(|fresh| std::mem::replace(&mut *store, fresh));
            let summary = match store.fold_day(batch) {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!(day = %batch.day, error = %e, "fold rejected");
                    if let Some(previous) = previous {
                        *store = previous;
                    }
                    return Err(e);
                }
            };
            let snapshot = self.persistence.as_ref().map(|_| store.snapshot());
            (summary, snapshot)
        };

        if let (Some(persistence), Some(snapshot)) = (self.persistence.clone(), snapshot) {
            tokio::task::spawn_blocking(move || persistence.save_snapshot(&snapshot)).await??;
        }

        info!(
            day = %summary.day,
            appended = summary.appended,
            new_series = summary.new_series,
            evicted = summary.evicted,
            dropped = summary.dropped,
            "day folded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pollutant, RawReading};
    use crate::readers::MemoryFetcher;
    use crate::store::{HistoryStore, SensorKey};
    use crate::utils::clock::FixedClock;
    use tempfile::TempDir;

    const STATION: &str = "FR04143";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn raw(day: NaiveDate, hour: u32, value: &str, validity: &str) -> RawReading {
        let start = format!("{} {:02}:00:00", day.format("%Y/%m/%d"), hour);
        RawReading::new(STATION, "NO2", &start, value, validity)
    }

    fn key(hour: u8) -> SensorKey {
        SensorKey::new(STATION, Pollutant::NitrogenDioxide, hour)
    }

    /// Days 1..=last published with one reading at 08h worth the day number.
    fn fetcher_with_days(last: u32) -> MemoryFetcher {
        let fetcher = MemoryFetcher::new();
        for d in 1..=last {
            fetcher.insert(day(d), vec![raw(day(d), 8, &d.to_string(), "1")]);
        }
        fetcher
    }

    fn advancer(
        fetcher: MemoryFetcher,
        today: NaiveDate,
    ) -> (WindowAdvancer<MemoryFetcher>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(today));
        let store = HistoryStore::new(3).unwrap().into_shared();
        let advancer = WindowAdvancer::new(store, fetcher, clock.clone());
        (advancer, clock)
    }

    #[tokio::test]
    async fn test_advance_requires_initialization() {
        let (advancer, _clock) = advancer(fetcher_with_days(5), day(6));
        assert_eq!(advancer.state().await, AdvancerState::Uninitialized);
        assert!(matches!(
            advancer.advance().await,
            Err(ProcessingError::NotInitialized)
        ));
        assert!(matches!(
            advancer.ensure_fresh().await,
            Err(ProcessingError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_initialize_fills_window_ending_yesterday() -> Result<()> {
        let (advancer, _clock) = advancer(fetcher_with_days(9), day(10));

        let report = advancer.initialize(3, None).await?;
        assert_eq!(report.days_folded(), 3);
        assert_eq!(report.checkpoint, Some(day(9)));
        assert_eq!(advancer.fetcher().calls(), vec![day(7), day(8), day(9)]);

        let store = advancer.store().read().await;
        assert_eq!(store.get(&key(8)).values(), vec![7.0, 8.0, 9.0]);
        assert_eq!(
            advancer.state().await,
            AdvancerState::Advancing { checkpoint: day(9) }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_initialize_leaves_gaps_for_missing_days() -> Result<()> {
        let fetcher = fetcher_with_days(9);
        fetcher.set_failing(day(8), true);
        let (advancer, _clock) = advancer(fetcher, day(10));

        let report = advancer.initialize(3, None).await?;
        assert_eq!(report.checkpoint, Some(day(9)));
        assert_eq!(report.skipped_days.len(), 1);
        assert_eq!(report.skipped_days[0].day, day(8));

        let store = advancer.store().read().await;
        assert_eq!(store.get(&key(8)).days(), vec![day(7), day(9)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_advance_catches_up_and_evicts() -> Result<()> {
        let (advancer, clock) = advancer(fetcher_with_days(12), day(10));
        advancer.initialize(3, None).await?;

        clock.set(day(13));
        assert_eq!(advancer.lag_days().await, Some(3));
        let report = advancer.advance().await?;
        assert_eq!(report.days_folded(), 3);
        assert!(report.is_up_to_date(day(12)));

        let store = advancer.store().read().await;
        assert_eq!(store.get(&key(8)).days(), vec![day(10), day(11), day(12)]);
        assert_eq!(store.checkpoint(), Some(day(12)));
        Ok(())
    }

    #[tokio::test]
    async fn test_advance_is_idempotent_when_up_to_date() -> Result<()> {
        let (advancer, _clock) = advancer(fetcher_with_days(9), day(10));
        advancer.initialize(3, None).await?;
        let calls_before = advancer.fetcher().calls().len();

        let report = advancer.advance().await?;
        assert_eq!(report.days_folded(), 0);
        assert_eq!(report.checkpoint, Some(day(9)));
        assert!(advancer.ensure_fresh().await?.is_none());
        assert_eq!(advancer.fetcher().calls().len(), calls_before);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_day_is_retried_without_refolding() -> Result<()> {
        let fetcher = fetcher_with_days(5);
        fetcher.set_failing(day(5), true);
        let (advancer, clock) = advancer(fetcher, day(4));
        advancer.initialize(3, None).await?;

        clock.set(day(6));
        let report = advancer.advance().await?;
        assert_eq!(report.days_folded(), 1);
        assert_eq!(report.checkpoint, Some(day(4)));
        assert_eq!(report.pending.as_ref().map(|p| p.day), Some(day(5)));

        advancer.fetcher().set_failing(day(5), false);
        let report = advancer.advance().await?;
        assert_eq!(report.checkpoint, Some(day(5)));
        assert!(report.pending.is_none());
        assert_eq!(advancer.fetcher().call_count(day(4)), 1);
        assert_eq!(advancer.fetcher().call_count(day(5)), 2);

        let store = advancer.store().read().await;
        assert_eq!(store.get(&key(8)).values(), vec![3.0, 4.0, 5.0]);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_and_duplicate_readings_are_not_folded() -> Result<()> {
        let fetcher = fetcher_with_days(9);
        fetcher.insert(
            day(10),
            vec![
                raw(day(10), 8, "40", "1"),
                raw(day(10), 8, "99", "1"),
                raw(day(10), 9, "", "0"),
                raw(day(9), 10, "12", "1"),
            ],
        );
        let (advancer, clock) = advancer(fetcher, day(10));
        advancer.initialize(3, None).await?;

        clock.set(day(11));
        let report = advancer.advance().await?;
        assert_eq!(report.readings_appended(), 1);
        assert_eq!(report.normalization.flagged_invalid, 1);
        assert_eq!(report.folded[0].dropped, 3);

        let store = advancer.store().read().await;
        assert_eq!(store.get(&key(8)).values(), vec![8.0, 9.0, 40.0]);
        assert!(store.get(&key(9)).is_empty());
        assert!(store.get(&key(10)).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_ordering_violation_halts_series() -> Result<()> {
        let (advancer, clock) = advancer(fetcher_with_days(11), day(10));
        advancer.initialize(3, None).await?;

        advancer.store().write().await.append(key(8), day(12), 1.0)?;
        clock.set(day(12));

        let err = advancer.advance().await.unwrap_err();
        assert!(matches!(err, ProcessingError::OutOfOrderDay { .. }));
        assert_eq!(advancer.store().read().await.checkpoint(), Some(day(9)));

        let report = advancer.advance().await?;
        assert_eq!(report.checkpoint, Some(day(11)));
        assert_eq!(report.folded[0].skipped_halted, 1);
        assert!(advancer.store().read().await.is_halted(&key(8)));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_stops_between_days() -> Result<()> {
        let (advancer, clock) = advancer(fetcher_with_days(12), day(10));
        advancer.initialize(3, None).await?;

        clock.set(day(13));
        advancer.cancel();
        let report = advancer.advance().await?;
        assert!(report.cancelled);
        assert_eq!(report.days_folded(), 0);
        assert_eq!(report.checkpoint, Some(day(9)));

        advancer.resume();
        let report = advancer.advance().await?;
        assert_eq!(report.checkpoint, Some(day(12)));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_before_initialize_keeps_existing_store() -> Result<()> {
        let dir = TempDir::new()?;
        let clock = Arc::new(FixedClock::new(day(10)));
        let store = HistoryStore::new(3)?.into_shared();
        let advancer = WindowAdvancer::new(store, fetcher_with_days(12), clock.clone())
            .with_persistence(StorePersistence::new(dir.path()));
        advancer.initialize(3, None).await?;

        clock.set(day(13));
        advancer.cancel();
        let report = advancer.initialize(3, None).await?;
        assert!(report.cancelled);
        assert_eq!(report.days_folded(), 0);
        assert_eq!(report.checkpoint, Some(day(9)));
        assert_eq!(advancer.fetcher().calls().len(), 3);

        {
            let store = advancer.store().read().await;
            assert_eq!(store.checkpoint(), Some(day(9)));
            assert_eq!(store.get(&key(8)).values(), vec![7.0, 8.0, 9.0]);
        }
        let persisted = StorePersistence::new(dir.path()).load()?.expect("snapshot kept");
        assert_eq!(persisted.checkpoint(), Some(day(9)));

        advancer.resume();
        let report = advancer.advance().await?;
        assert_eq!(report.checkpoint, Some(day(12)));
        Ok(())
    }

    struct SlowFetcher;

    impl DailyReadingFetcher for SlowFetcher {
        async fn fetch(&self, _day: NaiveDate) -> Result<Vec<RawReading>> {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_leaves_day_pending() -> Result<()> {
        let clock = Arc::new(FixedClock::new(day(10)));
        let mut store = HistoryStore::new(3)?;
        store.fold_day(&DayBatch::empty(day(8)))?;

        let advancer = WindowAdvancer::new(store.into_shared(), SlowFetcher, clock)
            .with_fetch_timeout(std::time::Duration::from_millis(20));

        let report = advancer.advance().await?;
        assert_eq!(report.checkpoint, Some(day(8)));
        assert_eq!(report.pending.as_ref().map(|p| p.day), Some(day(9)));
        Ok(())
    }

    #[tokio::test]
    async fn test_folds_are_persisted() -> Result<()> {
        let dir = TempDir::new()?;
        let clock = Arc::new(FixedClock::new(day(10)));
        let store = HistoryStore::new(3)?.into_shared();
        let advancer = WindowAdvancer::new(store, fetcher_with_days(9), clock)
            .with_persistence(StorePersistence::new(dir.path()));

        advancer.initialize(3, None).await?;

        let persistence = StorePersistence::new(dir.path());
        let restored = persistence.load()?.expect("snapshot written");
        assert_eq!(restored.checkpoint(), Some(day(9)));
        assert_eq!(restored.get(&key(8)).values(), vec![7.0, 8.0, 9.0]);
        assert_eq!(
            persistence.read_checkpoint()?.map(|c| c.last_updated_day),
            Some(day(9))
        );
        Ok(())
    }
}
