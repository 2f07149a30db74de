use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::error::{ProcessingError, Result};
use crate::models::RawReading;
use crate::readers::ReadingReader;
use crate::utils::filename::{daily_file_name, daily_file_url};

/// Supplies the raw records published for one calendar day.
pub trait DailyReadingFetcher: Send + Sync {
    fn fetch(&self, day: NaiveDate) -> impl Future<Output = Result<Vec<RawReading>>> + Send;
}

/// Reads `FR_E2_{YYYY-MM-DD}.csv` files from a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    dir: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DailyReadingFetcher for DirectoryFetcher {
    async fn fetch(&self, day: NaiveDate) -> Result<Vec<RawReading>> {
        let path = self.dir.join(daily_file_name(day));
        debug!(path = %path.display(), "reading daily file");

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ProcessingError::Fetch {
                day,
                message: format!("{}: {}", path.display(), e),
            })?;

        parse_daily_file(day, bytes).await
    }
}

/// Parses a fetched file off the runtime. A file that cannot be parsed
/// is reported as a failed fetch so the day stays retryable.
async fn parse_daily_file(
    day: NaiveDate,
    bytes: impl AsRef<[u8]> + Send + 'static,
) -> Result<Vec<RawReading>> {
    let parsed =
        tokio::task::spawn_blocking(move || ReadingReader::new().read_bytes(bytes.as_ref())).await;
    match parsed {
        Ok(Ok(readings)) => Ok(readings),
        Ok(Err(e)) => Err(ProcessingError::Fetch {
            day,
            message: format!("malformed daily file: {}", e),
        }),
        Err(e) => Err(ProcessingError::Fetch {
            day,
            message: format!("parse task failed: {}", e),
        }),
    }
}

/// Downloads daily files from the LCSQA open-data server.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("airq-processor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl DailyReadingFetcher for HttpFetcher {
    async fn fetch(&self, day: NaiveDate) -> Result<Vec<RawReading>> {
        let url = daily_file_url(&self.base_url, day);
        debug!(%url, "downloading daily file");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProcessingError::Fetch {
                day,
                message: format!("{} returned {}", url, status),
            });
        }
        let bytes = response.bytes().await?;

        parse_daily_file(day, bytes).await
    }
}

/// Fetcher selected from configuration at runtime.
#[derive(Debug, Clone)]
pub enum SourceFetcher {
    Directory(DirectoryFetcher),
    Http(HttpFetcher),
}

impl DailyReadingFetcher for SourceFetcher {
    async fn fetch(&self, day: NaiveDate) -> Result<Vec<RawReading>> {
        match self {
            SourceFetcher::Directory(fetcher) => fetcher.fetch(day).await,
            SourceFetcher::Http(fetcher) => fetcher.fetch(day).await,
        }
    }
}

/// In-memory days, for replays and tests. Days can be marked as failing.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    days: Mutex<HashMap<NaiveDate, Vec<RawReading>>>,
    failing: Mutex<HashSet<NaiveDate>>,
    calls: Mutex<Vec<NaiveDate>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, day: NaiveDate, readings: Vec<RawReading>) {
        self.days
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(day, readings);
    }

    pub fn set_failing(&self, day: NaiveDate, failing: bool) {
        let mut set = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing {
            set.insert(day);
        } else {
            set.remove(&day);
        }
    }

    /// Days requested so far, in call order.
    pub fn calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self, day: NaiveDate) -> usize {
        self.calls().into_iter().filter(|d| *d == day).count()
    }
}

impl DailyReadingFetcher for MemoryFetcher {
    async fn fetch(&self, day: NaiveDate) -> Result<Vec<RawReading>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(day);

        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&day)
        {
            return Err(ProcessingError::Fetch {
                day,
                message: "source unavailable".to_string(),
            });
        }

        self.days
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&day)
            .cloned()
            .ok_or_else(|| ProcessingError::Fetch {
                day,
                message: "no file published".to_string(),
            })
    }
}
