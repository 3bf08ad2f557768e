pub mod backfill;
pub mod collection_service;
pub mod gap_detector;
pub mod live_update;
pub mod report;

pub use collection_service::DataCollectionService;
pub use gap_detector::{compute_gaps, missing_ranges, missing_ranges_for, TimeRange};
pub use report::{CollectionJob, CollectionReport};
