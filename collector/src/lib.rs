//! OHLCV candle collection engine: exchange adapters, gap-aware backfill,
//! current-candle updates and the job scheduler that drives them.

pub mod error;
pub mod exchange;
pub mod repositories;
pub mod scheduler;
pub mod services;

pub use error::CollectorError;
pub use scheduler::{Scheduler, SchedulerStatus};
pub use services::{CollectionJob, CollectionReport, DataCollectionService};
