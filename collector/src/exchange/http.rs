//! Shared REST plumbing for the exchange adapters: pacing, retries and
//! value decoding helpers.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::client::{ExchangeError, ExchangeSettings, Ohlcv};

const MAX_ERROR_BODY: usize = 200;

pub struct HttpTransport {
    exchange: String,
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpTransport {
    pub fn new(
        settings: &ExchangeSettings,
        base_url: &str,
        headers: HeaderMap,
    ) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(settings.transport.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ExchangeError::Configuration {
                exchange: settings.code.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            exchange: settings.code.clone(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: settings.transport.max_retries,
            min_interval: settings.transport.min_request_interval,
            last_request: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body as JSON, retrying throttled and
    /// server-side failures with backoff.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            self.pace().await;
            debug!(exchange = %self.exchange, %url, attempt, "GET");

            let response = match self.client.get(&url).query(query).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return Err(ExchangeError::Timeout {
                        exchange: self.exchange.clone(),
                    })
                }
                Err(e) if e.is_connect() && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(exchange = %self.exchange, error = %e, ?delay, "connect failed, retrying");
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    return Err(ExchangeError::Transport {
                        exchange: self.exchange.clone(),
                        source: e,
                    })
                }
            };

            let status = response.status();
            if status.is_success() {
                return response.json::<Value>().await.map_err(|e| {
                    if e.is_timeout() {
                        ExchangeError::Timeout {
                            exchange: self.exchange.clone(),
                        }
                    } else {
                        ExchangeError::decode(&self.exchange, e.to_string())
                    }
                });
            }

            let throttled = is_throttled(status);
            if (throttled || status.is_server_error()) && attempt < self.max_retries {
                let delay = retry_after(response.headers()).unwrap_or_else(|| backoff_delay(attempt));
                warn!(
                    exchange = %self.exchange,
                    status = status.as_u16(),
                    ?delay,
                    attempt,
                    "request rejected, retrying"
                );
                sleep(delay).await;
                attempt += 1;
                continue;
            }

            if throttled {
                return Err(ExchangeError::RateLimited {
                    exchange: self.exchange.clone(),
                });
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                exchange: self.exchange.clone(),
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }
    }

    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn is_throttled(status: StatusCode) -> bool {
    // 418 is Binance's "IP banned after ignoring 429"
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418
}

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500u64 * 2u64.pow(attempt.min(6)))
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Fetches consecutive `[start, start + span)` windows from `since` until one
/// holds candles or a window reaches `now`. Venues whose history endpoint
/// only answers bounded windows use this to serve "candles from `since`
/// onward" across stretches with no trading.
pub(crate) async fn first_filled_window<F, Fut>(
    since: DateTime<Utc>,
    span: chrono::Duration,
    now: DateTime<Utc>,
    mut fetch: F,
) -> Result<Vec<Ohlcv>, ExchangeError>
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<Vec<Ohlcv>, ExchangeError>>,
{
    let mut start = since;
    loop {
        let candles = fetch(start).await?;
        let next = start + span;
        if !candles.is_empty() || next > now || span <= chrono::Duration::zero() {
            return Ok(candles);
        }
        debug!(%start, %next, "empty window, moving forward");
        start = next;
    }
}

pub(crate) fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Decimal from a JSON string or number.
pub(crate) fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        Value::Number(n) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .ok()
        }
        _ => None,
    }
}

/// Integer from a JSON string or number.
pub(crate) fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Positional access into one kline row, as most venues encode candles as
/// arrays.
pub(crate) struct Row<'a> {
    exchange: &'a str,
    fields: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn new(exchange: &'a str, value: &'a Value) -> Result<Self, ExchangeError> {
        let fields = value
            .as_array()
            .ok_or_else(|| ExchangeError::decode(exchange, "kline row is not an array"))?;
        Ok(Self { exchange, fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn decimal(&self, idx: usize) -> Result<Decimal, ExchangeError> {
        self.fields
            .get(idx)
            .and_then(decimal_value)
            .ok_or_else(|| ExchangeError::decode(self.exchange, format!("bad decimal at column {}", idx)))
    }

    pub fn opt_decimal(&self, idx: usize) -> Option<Decimal> {
        self.fields.get(idx).and_then(decimal_value)
    }

    pub fn int(&self, idx: usize) -> Result<i64, ExchangeError> {
        self.fields
            .get(idx)
            .and_then(int_value)
            .ok_or_else(|| ExchangeError::decode(self.exchange, format!("bad integer at column {}", idx)))
    }

    pub fn millis(&self, idx: usize) -> Result<DateTime<Utc>, ExchangeError> {
        let raw = self.int(idx)?;
        millis_to_utc(raw)
            .ok_or_else(|| ExchangeError::decode(self.exchange, format!("timestamp out of range: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(20), backoff_delay(6));
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_decimal_value_accepts_strings_and_numbers() {
        assert_eq!(decimal_value(&json!("42000.10")), Decimal::from_str("42000.10").ok());
        assert_eq!(decimal_value(&json!(12)), Some(Decimal::from(12)));
        assert_eq!(decimal_value(&json!("1e-3")), Decimal::from_str("0.001").ok());
        assert_eq!(decimal_value(&json!(null)), None);
        assert_eq!(decimal_value(&json!("abc")), None);
    }

    #[test]
    fn test_row_reports_bad_columns() {
        let value = json!([1700000000000i64, "1.5", "oops"]);
        let row = Row::new("test", &value).unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.millis(0).unwrap().timestamp(), 1_700_000_000);
        assert_eq!(row.decimal(1).unwrap(), Decimal::from_str("1.5").unwrap());
        assert!(row.decimal(2).is_err());
        assert!(row.decimal(9).is_err());
        assert!(Row::new("test", &json!({"a": 1})).is_err());
    }

    #[tokio::test]
    async fn test_walks_past_empty_windows() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let listed = since + chrono::Duration::minutes(30);
        let span = chrono::Duration::minutes(10);
        let now = since + chrono::Duration::minutes(60);
        let starts = std::sync::Mutex::new(Vec::new());

        let candles = first_filled_window(since, span, now, |start| {
            starts.lock().unwrap().push(start);
            async move {
                let mut out = Vec::new();
                let mut t = start.max(listed);
                while t < start + span {
                    out.push(Ohlcv::new(t, Decimal::ONE, Decimal::ONE, Decimal::ONE, Decimal::ONE, Decimal::ONE));
                    t = t + chrono::Duration::minutes(1);
                }
                Ok(out)
            }
        })
        .await
        .unwrap();

        assert_eq!(starts.lock().unwrap().len(), 4);
        assert_eq!(candles.len(), 10);
        assert_eq!(candles[0].open_time, listed);
    }

    #[tokio::test]
    async fn test_window_walk_stops_at_now() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let span = chrono::Duration::minutes(10);
        let now = since + chrono::Duration::minutes(25);
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let candles = first_filled_window(since, span, now, |_| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Ok(Vec::new()) }
        })
        .await
        .unwrap();

        assert!(candles.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_window_walk_propagates_errors() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let result = first_filled_window(since, chrono::Duration::minutes(10), Utc::now(), |_| async {
            Err(ExchangeError::decode("test", "boom"))
        })
        .await;
        assert!(matches!(result, Err(ExchangeError::Decode { .. })));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
