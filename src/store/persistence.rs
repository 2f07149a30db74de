use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{ProcessingError, Result};
use crate::store::{HistoryStore, StoreSnapshot};
use crate::utils::constants::{CHECKPOINT_FILE, SNAPSHOT_FILE};

/// Durable checkpoint record, written after every successful fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub last_updated_day: NaiveDate,
}

/// Snapshot and checkpoint files under one directory.
#[derive(Debug, Clone)]
pub struct StorePersistence {
    dir: PathBuf,
}

impl StorePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Loads the persisted store, `None` when nothing was saved yet.
    ///
    /// The snapshot carries its own checkpoint; a disagreeing checkpoint record is reported
    /// and the snapshot wins since both are rewritten together.
    pub fn load(&self) -> Result<Option<HistoryStore>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let snapshot: StoreSnapshot = read_json(&path)?;
        let store = HistoryStore::from_snapshot(snapshot)?;

        if let Some(record) = self.read_checkpoint()? {
            if Some(record.last_updated_day) != store.checkpoint() {
                warn!(
                    record = %record.last_updated_day,
                    snapshot = ?store.checkpoint(),
                    "checkpoint record disagrees with snapshot, using snapshot"
                );
            }
        }

        debug!(path = %path.display(), series = store.series_count(), "loaded history store");
        Ok(Some(store))
    }

    pub fn save(&self, store: &HistoryStore) -> Result<()> {
        self.save_snapshot(&store.snapshot())
    }

    /// Writes a snapshot taken earlier, so no store lock is needed during the I/O.
    pub fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_json_atomic(&self.dir, &self.snapshot_path(), snapshot)?;

        if let Some(day) = snapshot.checkpoint {
            write_json_atomic(
                &self.dir,
                &self.checkpoint_path(),
                &CheckpointRecord {
                    last_updated_day: day,
                },
            )?;
        }
        Ok(())
    }

    pub fn read_checkpoint(&self) -> Result<Option<CheckpointRecord>> {
        let path = self.checkpoint_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json_atomic<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| ProcessingError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pollutant;
    use crate::store::SensorKey;
    use tempfile::TempDir;

    #[test]
    fn test_missing_store_loads_as_none() -> Result<()> {
        let dir = TempDir::new()?;
        let persistence = StorePersistence::new(dir.path());
        assert!(persistence.load()?.is_none());
        assert!(persistence.read_checkpoint()?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new()?;
        let persistence = StorePersistence::new(dir.path().join("store"));
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let mut store = HistoryStore::new(45)?;
        let key = SensorKey::new("FR04143", Pollutant::Ozone, 14);
        store.append(key.clone(), day, 61.5)?;
        store.fold_day(&crate::store::DayBatch::empty(day.succ_opt().unwrap()))?;
        persistence.save(&store)?;

        let record = persistence.read_checkpoint()?.unwrap();
        assert_eq!(record.last_updated_day, day.succ_opt().unwrap());

        let loaded = persistence.load()?.unwrap();
        assert_eq!(loaded.checkpoint(), store.checkpoint());
        assert_eq!(loaded.get(&key).values(), vec![61.5]);
        Ok(())
    }

    #[test]
    fn test_snapshot_saved_after_later_changes_keeps_its_state() -> Result<()> {
        let dir = TempDir::new()?;
        let persistence = StorePersistence::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let key = SensorKey::new("FR04143", Pollutant::NitrogenDioxide, 8);

        let mut store = HistoryStore::new(3)?;
        store.append(key.clone(), day, 20.0)?;
        store.fold_day(&crate::store::DayBatch::empty(day.succ_opt().unwrap()))?;
        let snapshot = store.snapshot();

        store.reset(3)?;
        persistence.save_snapshot(&snapshot)?;

        let loaded = persistence.load()?.unwrap();
        assert_eq!(loaded.checkpoint(), day.succ_opt());
        assert_eq!(loaded.get(&key).values(), vec![20.0]);
        assert_eq!(
            persistence.read_checkpoint()?.map(|c| c.last_updated_day),
            day.succ_opt()
        );
        Ok(())
    }

    #[test]
    fn test_checkpoint_record_format() {
        let record = CheckpointRecord {
            last_updated_day: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"last_updated_day":"2024-03-05"}"#);
    }
}
