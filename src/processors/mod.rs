pub mod normalizer;
pub mod query_service;
pub mod window_advancer;

pub use normalizer::{NormalizationReport, NormalizeIssue, Normalizer};
pub use query_service::{ErrorResponse, HourlyAverages, QueryRequest, QueryResponse, QueryService};
pub use window_advancer::{AdvanceReport, AdvancerState, DayFailure, WindowAdvancer};
