use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::readers::{DirectoryFetcher, HttpFetcher, SourceFetcher};
use crate::store::StorePersistence;
use crate::utils::constants::{
    DEFAULT_BASE_URL, DEFAULT_CONFIG_FILE, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_STATIONS_FILE,
    DEFAULT_STORE_DIR, DEFAULT_WINDOW_CAPACITY, ENV_PREFIX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Directory,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Local folder of `FR_E2_*.csv` files, required for the directory source
    pub directory: Option<PathBuf>,
    #[validate(url)]
    pub base_url: String,
}

/// Runtime settings, layered as defaults, then the TOML file, then `AIRQ_*` variables.
///
/// Nested keys use a double underscore in the environment, e.g. `AIRQ_SOURCE__KIND=http`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(range(min = 1, max = 366))]
    pub window_capacity: u32,
    pub store_dir: PathBuf,
    pub stations_file: PathBuf,
    #[validate(range(min = 1))]
    pub fetch_timeout_secs: u64,
    #[validate(nested)]
    pub source: SourceConfig,
}

impl AppConfig {
    /// Loads settings. An explicit `path` must exist; otherwise `airq.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };
        Self::build(file)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::build(File::from_str(content, FileFormat::Toml))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .set_default("window_capacity", i64::from(DEFAULT_WINDOW_CAPACITY))?
            .set_default("store_dir", DEFAULT_STORE_DIR)?
            .set_default("stations_file", DEFAULT_STATIONS_FILE)?
            .set_default("fetch_timeout_secs", DEFAULT_FETCH_TIMEOUT_SECS as i64)?
            .set_default("source.kind", "http")?
            .set_default("source.base_url", DEFAULT_BASE_URL)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.validate()?;
        if app.source.kind == SourceKind::Directory && app.source.directory.is_none() {
            return Err(ProcessingError::Config(
                "source.directory is required when source.kind = \"directory\"".to_string(),
            ));
        }

        debug!(?app, "configuration loaded");
        Ok(app)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn persistence(&self) -> StorePersistence {
        StorePersistence::new(&self.store_dir)
    }

    pub fn build_fetcher(&self) -> Result<SourceFetcher> {
        match self.source.kind {
            SourceKind::Directory => {
                let dir = self.source.directory.clone().ok_or_else(|| {
                    ProcessingError::Config("source.directory is not set".to_string())
                })?;
                Ok(SourceFetcher::Directory(DirectoryFetcher::new(dir)))
            }
            SourceKind::Http => Ok(SourceFetcher::Http(HttpFetcher::new(
                self.source.base_url.clone(),
                self.fetch_timeout(),
            )?)),
        }
    }
}
