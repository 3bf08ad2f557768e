//! Exchange Registry - maps exchange codes to market data client factories

use std::collections::HashMap;
use std::sync::Arc;

use super::binance::BinanceClient;
use super::bybit::BybitClient;
use super::client::{ExchangeError, ExchangeSettings, MarketDataClient};
use super::gate::GateClient;
use super::okx::OkxClient;

pub type ClientFactory =
    Box<dyn Fn(&ExchangeSettings) -> Result<Arc<dyn MarketDataClient>, ExchangeError> + Send + Sync>;

pub struct ExchangeRegistry {
    factories: HashMap<String, ClientFactory>,
}

impl ExchangeRegistry {
    /// Registry with the built-in venue adapters.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register("binance", |settings| {
            Ok(Arc::new(BinanceClient::new(settings)?) as Arc<dyn MarketDataClient>)
        });
        registry.register("binance_testnet", |settings| {
            let mut settings = settings.clone();
            settings.sandbox = true;
            Ok(Arc::new(BinanceClient::new(&settings)?) as Arc<dyn MarketDataClient>)
        });
        registry.register("okx", |settings| {
            Ok(Arc::new(OkxClient::new(settings)?) as Arc<dyn MarketDataClient>)
        });
        registry.register("bybit", |settings| {
            Ok(Arc::new(BybitClient::new(settings)?) as Arc<dyn MarketDataClient>)
        });
        registry.register("gate", |settings| {
            Ok(Arc::new(GateClient::new(settings)?) as Arc<dyn MarketDataClient>)
        });

        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, code: &str, factory: F)
    where
        F: Fn(&ExchangeSettings) -> Result<Arc<dyn MarketDataClient>, ExchangeError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(code.to_lowercase(), Box::new(factory));
    }

    pub fn create_client(
        &self,
        settings: &ExchangeSettings,
    ) -> Result<Arc<dyn MarketDataClient>, ExchangeError> {
        let code = settings.code.to_lowercase();
        let factory = self
            .factories
            .get(&code)
            .ok_or_else(|| ExchangeError::UnsupportedExchange(code.clone()))?;
        factory(settings)
    }

    pub fn supported_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.factories.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn supports(&self, code: &str) -> bool {
        self.factories.contains_key(&code.to_lowercase())
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::client::{Credentials, TransportSettings};

    fn settings(code: &str, sandbox: bool) -> ExchangeSettings {
        ExchangeSettings {
            exchange_id: 1,
            name: code.to_string(),
            code: code.to_string(),
            sandbox,
            credentials: Credentials::default(),
            transport: TransportSettings::default(),
        }
    }

    #[test]
    fn test_builtin_codes() {
        let registry = ExchangeRegistry::new();
        assert_eq!(
            registry.supported_codes(),
            vec!["binance", "binance_testnet", "bybit", "gate", "okx"]
        );
        assert!(registry.supports("BINANCE"));
        assert!(!registry.supports("kraken"));
    }

    #[test]
    fn test_create_known_and_unknown() {
        let registry = ExchangeRegistry::new();
        let client = registry.create_client(&settings("okx", false)).unwrap();
        assert_eq!(client.exchange_code(), "okx");
        assert_eq!(client.max_page_size(), 100);

        assert!(matches!(
            registry.create_client(&settings("kraken", false)),
            Err(ExchangeError::UnsupportedExchange(code)) if code == "kraken"
        ));
    }

    #[test]
    fn test_gate_rejects_sandbox() {
        let registry = ExchangeRegistry::new();
        assert!(matches!(
            registry.create_client(&settings("gate", true)),
            Err(ExchangeError::Configuration { .. })
        ));
    }
}
