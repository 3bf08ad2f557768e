pub use super::candles::Entity as Candles;
pub use super::currency_pairs::Entity as CurrencyPairs;
pub use super::exchanges::Entity as Exchanges;
pub use super::symbols::Entity as Symbols;
pub use super::time_periods::Entity as TimePeriods;
