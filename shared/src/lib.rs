pub mod config;
pub mod database;
pub mod entity;
pub mod timeframe;

pub use config::{CollectionSettings, Config};
pub use database::get_db_connection;
pub use timeframe::{to_timeframe_token, Timeframe};
