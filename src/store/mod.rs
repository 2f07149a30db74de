pub mod batch;
pub mod history;
pub mod history_store;
pub mod persistence;

pub use batch::DayBatch;
pub use history::{History, HistoryEntry, SensorKey};
pub use history_store::{FoldSummary, HistoryStore, SeriesSnapshot, SharedStore, StoreSnapshot};
pub use persistence::{CheckpointRecord, StorePersistence};
