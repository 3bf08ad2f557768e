//! Market data capability shared by every exchange adapter.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::entity::exchanges;
use shared::{CollectionSettings, Timeframe};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Unsupported exchange: {0}")]
    UnsupportedExchange(String),
    #[error("{exchange} does not offer timeframe {timeframe}")]
    UnsupportedTimeframe { exchange: String, timeframe: Timeframe },
    #[error("Invalid symbol format: {0} (expected BASE/QUOTE)")]
    InvalidSymbol(String),
    #[error("Invalid configuration for {exchange}: {reason}")]
    Configuration { exchange: String, reason: String },
    #[error("Request to {exchange} timed out")]
    Timeout { exchange: String },
    #[error("Rate limited by {exchange}")]
    RateLimited { exchange: String },
    #[error("HTTP {status} from {exchange}: {body}")]
    Status {
        exchange: String,
        status: u16,
        body: String,
    },
    #[error("{exchange} API error {code}: {message}")]
    Api {
        exchange: String,
        code: String,
        message: String,
    },
    #[error("Malformed response from {exchange}: {reason}")]
    Decode { exchange: String, reason: String },
    #[error("Transport error talking to {exchange}: {source}")]
    Transport {
        exchange: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ExchangeError {
    pub fn decode(exchange: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            exchange: exchange.to_string(),
            reason: reason.into(),
        }
    }
}

/// One OHLCV observation as returned by an exchange, before it is tied to
/// stored pair/exchange/timeframe ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ohlcv {
    pub open_time: DateTime<Utc>,
    /// `None` when the venue does not report a close boundary.
    pub close_time: Option<DateTime<Utc>>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Option<Decimal>,
    pub trades_count: Option<i32>,
}

impl Ohlcv {
    pub fn new(
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            open_time,
            close_time: None,
            open,
            high,
            low,
            close,
            volume,
            quote_volume: None,
            trades_count: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub passphrase: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &mask(&self.api_secret))
            .field("passphrase", &mask(&self.passphrase))
            .finish()
    }
}

/// HTTP behaviour shared by all adapters.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub min_request_interval: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from(&CollectionSettings::default())
    }
}

impl From<&CollectionSettings> for TransportSettings {
    fn from(settings: &CollectionSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout,
            max_retries: settings.max_retries,
            min_request_interval: settings.min_request_interval,
        }
    }
}

/// Everything an adapter factory needs to build a client for one exchange row.
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    pub exchange_id: i32,
    pub name: String,
    pub code: String,
    pub sandbox: bool,
    pub credentials: Credentials,
    pub transport: TransportSettings,
}

impl ExchangeSettings {
    pub fn from_model(exchange: &exchanges::Model, transport: &TransportSettings) -> Self {
        Self {
            exchange_id: exchange.id,
            name: exchange.name.clone(),
            code: exchange.code.trim().to_lowercase(),
            sandbox: exchange.is_sandbox(),
            credentials: Credentials {
                api_key: exchange.api_key.clone().filter(|k| !k.is_empty()),
                api_secret: exchange.api_secret.clone().filter(|s| !s.is_empty()),
                passphrase: exchange.api_passphrase.clone().filter(|p| !p.is_empty()),
            },
            transport: transport.clone(),
        }
    }
}

/// Read-only OHLCV access to one exchange.
///
/// Implementations return candles ordered by `open_time` ascending and keep
/// rate limiting and retries to themselves; callers only see data or an error.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    fn exchange_code(&self) -> &str;

    /// Largest page the venue serves in a single request.
    fn max_page_size(&self) -> u32 {
        1000
    }

    /// Candles starting at `since` (inclusive), or the most recent ones when
    /// `since` is `None`.
    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError>;

    /// The newest (possibly still forming) candle.
    async fn fetch_latest(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<Ohlcv>, ExchangeError> {
        let mut candles = self.fetch_range(symbol, timeframe, None, 2).await?;
        Ok(candles.pop())
    }
}

/// Splits "BTC/USDT" into ("BTC", "USDT").
pub fn split_symbol(symbol: &str) -> Result<(&str, &str), ExchangeError> {
    match symbol.split_once('/') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('/') => {
            Ok((base, quote))
        }
        _ => Err(ExchangeError::InvalidSymbol(symbol.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("BTC/USDT").unwrap(), ("BTC", "USDT"));
        assert!(split_symbol("BTCUSDT").is_err());
        assert!(split_symbol("BTC/").is_err());
        assert!(split_symbol("A/B/C").is_err());
    }

    #[test]
    fn test_credentials_debug_is_masked() {
        let creds = Credentials {
            api_key: Some("key-123".to_string()),
            api_secret: Some("secret-456".to_string()),
            passphrase: None,
        };
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("key-123"));
        assert!(!printed.contains("secret-456"));
        assert!(printed.contains("***"));
    }
}
