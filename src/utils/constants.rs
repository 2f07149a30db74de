/// Window capacities used by the official guidance horizons
pub const SHORT_WINDOW_CAPACITY: u32 = 45;
pub const LONG_WINDOW_CAPACITY: u32 = 180;
pub const DEFAULT_WINDOW_CAPACITY: u32 = SHORT_WINDOW_CAPACITY;
pub const MAX_WINDOW_CAPACITY: u32 = 366;

pub const HOURS_PER_DAY: u8 = 24;

/// Source file conventions
pub const SOURCE_FILE_PREFIX: &str = "FR_E2_";
pub const SOURCE_FILE_EXTENSION: &str = "csv";
pub const SOURCE_DELIMITER: u8 = b';';
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
pub const SOURCE_VALID_FLAG: &str = "1";
pub const DEFAULT_BASE_URL: &str =
    "https://files.data.gouv.fr/lcsqa/concentrations-de-polluants-atmospheriques-reglementes/temps-reel";

/// Persistence file names
pub const SNAPSHOT_FILE: &str = "history.json";
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Processing defaults
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STORE_DIR: &str = "data";
pub const DEFAULT_STATIONS_FILE: &str = "stations.csv";
pub const DEFAULT_CONFIG_FILE: &str = "airq.toml";
pub const ENV_PREFIX: &str = "AIRQ";

/// Overseas territories are browsed under a single synthetic region
pub const OVERSEAS_REGION: &str = "OUTRE-MER";
pub const OVERSEAS_TERRITORIES: [&str; 6] = [
    "GUADELOUPE",
    "GUYANE",
    "MARTINIQUE",
    "LA REUNION",
    "MAYOTTE",
    "SAINT-MARTIN",
];
