// src/sink.rs
use crate::cache::ContractCache;
use crate::db::Store;
use crate::error::PersistError;
use crate::models::{ContractRow, DiscoveredContract, PoolCreationRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where discovered contracts and pools end up.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn save_contract(&self, contract: &DiscoveredContract) -> Result<(), PersistError>;

    async fn save_pool(&self, pool: &PoolCreationRecord) -> Result<(), PersistError>;
}

/// SQLite store plus Redis cache. Either side may be absent; with both absent
/// records are only logged.
pub struct Gateway {
    store: Option<Store>,
    cache: Option<Arc<dyn ContractCache>>,
}

impl Gateway {
    pub fn new(store: Option<Store>, cache: Option<Arc<dyn ContractCache>>) -> Self {
        Self { store, cache }
    }

    pub fn disabled() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl Sink for Gateway {
    async fn save_contract(&self, contract: &DiscoveredContract) -> Result<(), PersistError> {
        let row = ContractRow::from(contract);

        let stored = match &self.store {
            Some(store) => store.insert_contract(&row, &contract.bytecode),
            None => Ok(()),
        };
        match &stored {
            Ok(()) if self.store.is_some() => debug!("💾 Pushed {} to db", row.contract_address),
            Ok(()) => {}
            Err(e) => error!("Error pushing contract to db: {}", e),
        }

        // cached even when the db insert failed
        let cached = match &self.cache {
            Some(cache) => cache.put_contract(&row).await,
            None => Ok(()),
        };
        match &cached {
            Ok(()) if self.cache.is_some() => debug!("💾 Pushed {} to Redis", row.contract_address),
            Ok(()) => {}
            Err(e) => error!("Error pushing contract {} to Redis: {}", row.contract_address, e),
        }

        if self.store.is_none() && self.cache.is_none() {
            info!("Persistence disabled, not saving {}", row.contract_address);
        }

        stored?;
        cached?;
        Ok(())
    }

    async fn save_pool(&self, pool: &PoolCreationRecord) -> Result<(), PersistError> {
        match &self.store {
            Some(store) => {
                store.insert_pool(pool)?;
                debug!("💾 Pushed {} pool {} to db", pool.exchange, pool.pool);
            }
            None => info!("Persistence disabled, not saving {} pool {}", pool.exchange, pool.pool),
        }
        Ok(())
    }
}
