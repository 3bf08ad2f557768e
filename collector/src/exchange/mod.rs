pub mod binance;
pub mod bybit;
pub mod cache;
pub mod client;
pub mod gate;
pub mod http;
pub mod okx;
pub mod registry;

pub use cache::ExchangeClientCache;
pub use client::{
    split_symbol, Credentials, ExchangeError, ExchangeSettings, MarketDataClient, Ohlcv,
    TransportSettings,
};
pub use registry::{ClientFactory, ExchangeRegistry};
