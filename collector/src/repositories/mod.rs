pub mod candle_repository;
pub mod reference_repository;

pub use candle_repository::{CandleFilter, CandleStats, SeriesKey, WriteOutcome};
pub use reference_repository::{ActivePair, ActivePeriod, ActiveSet};
