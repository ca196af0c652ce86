// src/error.rs
use alloy::primitives::{Address, B256};
use thiserror::Error;

/// Failure talking to the node.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("{0} subscription closed")]
    SubscriptionClosed(&'static str),
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("debug_traceTransaction failed for {hash} after {attempts} attempts: {source}")]
    Rpc {
        hash: B256,
        attempts: u32,
        #[source]
        source: ChainError,
    },

    #[error("unreadable call trace for {hash}: {reason}")]
    Malformed { hash: B256, reason: String },
}

#[derive(Debug, Error)]
#[error("failed to get bytecode for {address}: {source}")]
pub struct ClassifyError {
    pub address: Address,
    #[source]
    pub source: ChainError,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to call totalSupply on {address}: {source}")]
    TotalSupplyCall {
        address: Address,
        #[source]
        source: ChainError,
    },

    #[error("failed to unpack totalSupply from {address}: {reason}")]
    TotalSupplyDecode { address: Address, reason: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected at least 3 topics, got {0}")]
    MissingTopics(usize),

    #[error("failed to unpack {event} event data: {reason}")]
    Body { event: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to parse ABI for {exchange}: {reason}")]
    Abi { exchange: String, reason: String },

    #[error("no 'PoolCreated' or 'PairCreated' event found in ABI for {0}")]
    NoRecognizedEvent(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row already exists: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection poisoned")]
    Poisoned,

    #[error("value does not fit an SQLite integer: {0}")]
    OutOfRange(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A write through the persistence gateway failed; never escalated past a log line.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Reason a long-running task stopped.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}
