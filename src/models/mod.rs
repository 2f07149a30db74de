pub mod directory;
pub mod pollutant;
pub mod reading;
pub mod station;

pub use directory::{StationDirectory, StationLookup};
pub use pollutant::{ExposureBand, Pollutant};
pub use reading::{RawReading, Reading};
pub use station::StationMetadata;
