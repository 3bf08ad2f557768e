use sea_orm::DbErr;
use thiserror::Error;

use crate::exchange::ExchangeError;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Invalid symbol format: {0} (expected BASE/QUOTE)")]
    InvalidSymbol(String),
    #[error("{role} symbol {symbol} not found")]
    SymbolNotFound { role: &'static str, symbol: String },
    #[error("Currency pair {0} not found")]
    CurrencyPairNotFound(String),
    #[error("Currency pair {pair_id} references unknown symbol id {symbol_id}")]
    DanglingSymbol { pair_id: i32, symbol_id: i32 },
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

pub type Result<T, E = CollectorError> = std::result::Result<T, E>;
