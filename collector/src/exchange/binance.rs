use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use shared::Timeframe;

use super::client::{split_symbol, ExchangeError, ExchangeSettings, MarketDataClient, Ohlcv};
use super::http::{HttpTransport, Row};

const MAINNET_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";
const MAX_LIMIT: u32 = 1000;

pub struct BinanceClient {
    code: String,
    transport: HttpTransport,
}

impl BinanceClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, ExchangeError> {
        let base_url = if settings.sandbox { TESTNET_URL } else { MAINNET_URL };
        let mut headers = HeaderMap::new();
        if let Some(key) = &settings.credentials.api_key {
            let value = HeaderValue::from_str(key).map_err(|_| ExchangeError::Configuration {
                exchange: settings.code.clone(),
                reason: "API key contains invalid header characters".to_string(),
            })?;
            headers.insert("X-MBX-APIKEY", value);
        }

        Ok(Self {
            code: settings.code.clone(),
            transport: HttpTransport::new(settings, base_url, headers)?,
        })
    }
}

pub(crate) fn market_symbol(symbol: &str) -> Result<String, ExchangeError> {
    let (base, quote) = split_symbol(symbol)?;
    Ok(format!("{}{}", base, quote).to_uppercase())
}

/// Decodes a `/api/v3/klines` payload:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume, trades, ...]`.
pub(crate) fn parse_klines(exchange: &str, payload: &Value) -> Result<Vec<Ohlcv>, ExchangeError> {
    let rows = payload
        .as_array()
        .ok_or_else(|| ExchangeError::decode(exchange, "expected an array of klines"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for raw in rows {
        let row = Row::new(exchange, raw)?;
        let mut candle = Ohlcv::new(
            row.millis(0)?,
            row.decimal(1)?,
            row.decimal(2)?,
            row.decimal(3)?,
            row.decimal(4)?,
            row.decimal(5)?,
        );
        candle.close_time = row.millis(6).ok();
        candle.quote_volume = row.opt_decimal(7);
        candle.trades_count = row.int(8).ok().and_then(|n| i32::try_from(n).ok());
        candles.push(candle);
    }
    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

#[async_trait]
impl MarketDataClient for BinanceClient {
    fn exchange_code(&self) -> &str {
        &self.code
    }

    fn max_page_size(&self) -> u32 {
        MAX_LIMIT
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        let mut query = vec![
            ("symbol", market_symbol(symbol)?),
            ("interval", timeframe.token().to_string()),
            ("limit", limit.clamp(1, MAX_LIMIT).to_string()),
        ];
        if let Some(since) = since {
            query.push(("startTime", since.timestamp_millis().to_string()));
        }

        let payload = self.transport.get_json("/api/v3/klines", &query).await?;
        parse_klines(&self.code, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_market_symbol() {
        assert_eq!(market_symbol("btc/usdt").unwrap(), "BTCUSDT");
        assert!(market_symbol("BTCUSDT").is_err());
    }

    #[test]
    fn test_parse_klines() {
        let payload = json!([
            [1700000060000i64, "101.0", "103.0", "100.5", "102.0", "12.5", 1700000119999i64, "1275.0", 42, "6.0", "612.0", "0"],
            [1700000000000i64, "100.0", "102.0", "99.0", "101.0", "10.0", 1700000059999i64, "1005.0", 37, "5.0", "500.0", "0"]
        ]);
        let candles = parse_klines("binance", &payload).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(candles[0].close, Decimal::from_str("101.0").unwrap());
        assert_eq!(candles[0].trades_count, Some(37));
        assert_eq!(candles[0].quote_volume, Some(Decimal::from(1005)));
        assert_eq!(
            candles[1].close_time.map(|t| t.timestamp_millis()),
            Some(1_700_000_119_999)
        );
    }

    #[test]
    fn test_parse_klines_rejects_garbage() {
        assert!(parse_klines("binance", &json!({"code": -1121, "msg": "Invalid symbol."})).is_err());
        assert!(parse_klines("binance", &json!([[1700000000000i64, "x"]])).is_err());
    }
}
