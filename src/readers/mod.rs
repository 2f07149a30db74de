pub mod fetcher;
pub mod reading_reader;
pub mod station_reader;

pub use fetcher::{DailyReadingFetcher, DirectoryFetcher, HttpFetcher, MemoryFetcher, SourceFetcher};
pub use reading_reader::ReadingReader;
pub use station_reader::StationReader;
