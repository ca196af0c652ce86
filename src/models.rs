// src/models.rs
use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// ERC20 metadata assembled from read-only calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub total_supply: U256,
    pub decimals: u8,
}

/// A contract created inside a transaction that passed the ERC20 heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredContract {
    pub address: Address,
    pub creator: Address,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub symbol: String,
    pub bytecode: Bytes,
    pub total_supply: U256,
    pub decimals: u8,
    pub is_erc20: bool,
}

/// A new pair/pool announced by an exchange factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCreationRecord {
    pub exchange: &'static str,
    pub created_coin: Address,
    pub backing_coin: Address,
    pub pool: Address,
    pub transaction_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
}

/// Row shape shared by the `contracts` table and the cache entry.
#[derive(Debug, Clone, Serialize)]
pub struct ContractRow {
    pub contract_address: String,
    pub creator_address: String,
    pub transaction_hash: String,
    pub block_number: u64,
    pub symbol: String,
    pub bytecode: String,      // 0x-prefixed hex in the cache, BLOB in the db
    pub total_supply: String,  // decimal string, full U256 precision
    pub decimals: u8,
    pub blacklisted: bool,
    pub discovered_at: DateTime<Utc>,
}

impl From<&DiscoveredContract> for ContractRow {
    fn from(c: &DiscoveredContract) -> Self {
        Self {
            contract_address: c.address.to_checksum(None),
            creator_address: c.creator.to_checksum(None),
            transaction_hash: c.transaction_hash.to_string(),
            block_number: c.block_number,
            symbol: c.symbol.clone(),
            bytecode: c.bytecode.to_string(),
            total_supply: c.total_supply.to_string(),
            decimals: c.decimals,
            blacklisted: false,
            discovered_at: Utc::now(),
        }
    }
}
