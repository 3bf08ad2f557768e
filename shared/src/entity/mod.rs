pub mod prelude;

pub mod candles;
pub mod currency_pairs;
pub mod exchanges;
pub mod symbols;
pub mod time_periods;
