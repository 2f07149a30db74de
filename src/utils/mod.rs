pub mod clock;
pub mod constants;
pub mod filename;
pub mod progress;

pub use clock::{Clock, FixedClock, SystemClock};
pub use constants::*;
pub use filename::{daily_file_name, daily_file_url, default_export_filename};
pub use progress::ProgressReporter;
