use std::collections::HashMap;
use std::sync::Arc;

use shared::entity::exchanges;
use tokio::sync::RwLock;
use tracing::info;

use super::client::{ExchangeError, ExchangeSettings, MarketDataClient, TransportSettings};
use super::registry::ExchangeRegistry;

/// One market data client per stored exchange id, kept for the life of the
/// process.
pub struct ExchangeClientCache {
    registry: ExchangeRegistry,
    transport: TransportSettings,
    clients: RwLock<HashMap<i32, Arc<dyn MarketDataClient>>>,
}

impl ExchangeClientCache {
    pub fn new(registry: ExchangeRegistry, transport: TransportSettings) -> Self {
        Self {
            registry,
            transport,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &ExchangeRegistry {
        &self.registry
    }

    /// Returns the cached client for `exchange`, building it on first use.
    ///
    /// Concurrent first requests may each build a client; whichever is stored
    /// first is the one every caller gets back.
    pub async fn get_or_create(
        &self,
        exchange: &exchanges::Model,
    ) -> Result<Arc<dyn MarketDataClient>, ExchangeError> {
        if let Some(client) = self.clients.read().await.get(&exchange.id) {
            return Ok(Arc::clone(client));
        }

        let settings = ExchangeSettings::from_model(exchange, &self.transport);
        let client = self.registry.create_client(&settings)?;

        let mut clients = self.clients.write().await;
        let stored = clients.entry(exchange.id).or_insert_with(|| {
            info!(
                exchange_id = exchange.id,
                code = %settings.code,
                sandbox = settings.sandbox,
                "market data client created"
            );
            client
        });
        Ok(Arc::clone(stored))
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::client::Ohlcv;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use shared::Timeframe;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullClient(String);

    #[async_trait]
    impl MarketDataClient for NullClient {
        fn exchange_code(&self) -> &str {
            &self.0
        }

        async fn fetch_range(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _since: Option<DateTime<Utc>>,
            _limit: u32,
        ) -> Result<Vec<Ohlcv>, ExchangeError> {
            Ok(Vec::new())
        }
    }

    fn exchange(id: i32, code: &str) -> exchanges::Model {
        exchanges::Model {
            id,
            name: code.to_string(),
            code: code.to_string(),
            environment: "production".to_string(),
            api_key: None,
            api_secret: None,
            api_passphrase: None,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn counting_cache(builds: Arc<AtomicUsize>) -> ExchangeClientCache {
        let mut registry = ExchangeRegistry::empty();
        registry.register("null", move |settings| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullClient(settings.code.clone())) as Arc<dyn MarketDataClient>)
        });
        ExchangeClientCache::new(registry, TransportSettings::default())
    }

    #[tokio::test]
    async fn test_client_is_reused_per_exchange_id() {
        let builds = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&builds));

        let a = cache.get_or_create(&exchange(1, "null")).await.unwrap();
        let b = cache.get_or_create(&exchange(1, "null")).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        cache.get_or_create(&exchange(2, "null")).await.unwrap();
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_unsupported_code_is_not_cached() {
        let cache = counting_cache(Arc::new(AtomicUsize::new(0)));
        let result = cache.get_or_create(&exchange(3, "kraken")).await;
        assert!(matches!(result, Err(ExchangeError::UnsupportedExchange(_))));
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_yields_one_instance() {
        let cache = Arc::new(counting_cache(Arc::new(AtomicUsize::new(0))));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.get_or_create(&exchange(7, "null")).await.unwrap()
            }));
        }
        let mut clients = Vec::new();
        for handle in handles {
            clients.push(handle.await.unwrap());
        }
        for client in &clients[1..] {
            assert!(Arc::ptr_eq(&clients[0], client));
        }
        assert_eq!(cache.len().await, 1);
    }
}
