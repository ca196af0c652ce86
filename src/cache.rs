// src/cache.rs
use crate::error::CacheError;
use crate::models::ContractRow;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Cmd};
use tracing::info;

/// Discovered contracts expire from the cache after a day.
pub const CONTRACT_TTL_SECS: u64 = 24 * 60 * 60;

/// Short-lived copy of freshly discovered contracts for downstream readers.
#[async_trait]
pub trait ContractCache: Send + Sync {
    async fn put_contract(&self, row: &ContractRow) -> Result<(), CacheError>;
}

/// `SET <checksummed address> <row json> EX 86400`
pub fn set_contract_cmd(row: &ContractRow) -> Result<Cmd, CacheError> {
    let json = serde_json::to_string(row)?;
    let mut cmd = redis::cmd("SET");
    cmd.arg(&row.contract_address)
        .arg(json)
        .arg("EX")
        .arg(CONTRACT_TTL_SECS);
    Ok(cmd)
}

/// Redis cache of freshly discovered contracts, keyed by contract address.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;

        info!("Connection to Redis was successful ({})", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl ContractCache for Cache {
    async fn put_contract(&self, row: &ContractRow) -> Result<(), CacheError> {
        let cmd = set_contract_cmd(row)?;
        let mut conn = self.conn.clone();
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
