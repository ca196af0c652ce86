// src/rpc.rs
use crate::error::ChainError;
use alloy::consensus::transaction::SignerRecoverable;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionInput, TransactionRequest};
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::json;
use serde_json::value::RawValue;
use tracing::info;

/// A contract log as delivered by a log subscription.
#[derive(Debug, Clone, Default)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl From<Log> for RawLog {
    fn from(log: Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeadNotice {
    pub number: u64,
    pub hash: B256,
    pub miner: Address,
}

#[derive(Debug, Clone)]
pub struct ChainTx {
    pub hash: B256,
    /// Signer recovered from the transaction signature, `None` if recovery failed.
    pub sender: Option<Address>,
}

#[derive(Debug, Clone)]
pub struct ChainBlock {
    pub number: u64,
    pub hash: B256,
    pub transactions: Vec<ChainTx>,
}

/// Everything the pipeline needs from a node. Shared read-only across tasks.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn subscribe_heads(&self) -> Result<BoxStream<'static, HeadNotice>, ChainError>;

    async fn block_by_hash(&self, hash: B256) -> Result<Option<ChainBlock>, ChainError>;

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError>;

    /// Read-only `eth_call` against the latest block.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError>;

    async fn receipt_block_number(&self, tx: B256) -> Result<Option<u64>, ChainError>;

    /// Raw `callTracer` output for a mined transaction, full call tree. Left
    /// undecoded so arbitrarily deep trees survive the transport.
    async fn trace_call_tree(&self, tx: B256) -> Result<Box<RawValue>, ChainError>;

    async fn subscribe_logs(
        &self,
        address: Address,
    ) -> Result<BoxStream<'static, RawLog>, ChainError>;
}

fn transport(e: impl std::fmt::Display) -> ChainError {
    ChainError::Transport(e.to_string())
}

/// Node access over alloy providers. The primary endpoint serves subscriptions
/// and reads, the debug endpoint serves `debug_traceTransaction`.
#[derive(Clone)]
pub struct AlloyChain {
    primary: DynProvider,
    debug: DynProvider,
}

impl AlloyChain {
    pub async fn connect(primary_url: &str, debug_url: &str) -> eyre::Result<Self> {
        let primary = ProviderBuilder::new().connect(primary_url).await?.erased();
        info!("Connected to primary endpoint: {}", primary_url);

        let debug = if debug_url == primary_url {
            primary.clone()
        } else {
            let provider = ProviderBuilder::new().connect(debug_url).await?.erased();
            info!("Connected to debug endpoint: {}", debug_url);
            provider
        };

        Ok(Self { primary, debug })
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        self.primary.get_chain_id().await.map_err(transport)
    }
}

#[async_trait]
impl ChainReader for AlloyChain {
    async fn subscribe_heads(&self) -> Result<BoxStream<'static, HeadNotice>, ChainError> {
        let sub = self.primary.subscribe_blocks().await.map_err(transport)?;
        Ok(sub
            .into_stream()
            .map(|header| HeadNotice {
                number: header.inner.number,
                hash: header.hash,
                miner: header.inner.beneficiary,
            })
            .boxed())
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Option<ChainBlock>, ChainError> {
        let block = self
            .primary
            .get_block_by_hash(hash)
            .full()
            .await
            .map_err(transport)?;

        Ok(block.map(|block| ChainBlock {
            number: block.header.inner.number,
            hash: block.header.hash,
            transactions: block
                .transactions
                .txns()
                .map(|tx| ChainTx {
                    hash: TransactionResponse::tx_hash(tx),
                    sender: tx.inner.inner().recover_signer().ok(),
                })
                .collect(),
        }))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        self.primary.get_code_at(address).await.map_err(transport)
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(input));
        self.primary.call(request).await.map_err(transport)
    }

    async fn receipt_block_number(&self, tx: B256) -> Result<Option<u64>, ChainError> {
        let receipt = self
            .primary
            .get_transaction_receipt(tx)
            .await
            .map_err(transport)?;
        Ok(receipt.and_then(|r| r.block_number))
    }

    async fn trace_call_tree(&self, tx: B256) -> Result<Box<RawValue>, ChainError> {
        // the default struct logger is not supported by most providers
        let options = json!({
            "tracer": "callTracer",
            "tracerConfig": { "onlyTopCall": false }
        });
        self.debug
            .raw_request::<_, Box<RawValue>>("debug_traceTransaction".into(), (tx, options))
            .await
            .map_err(transport)
    }

    async fn subscribe_logs(
        &self,
        address: Address,
    ) -> Result<BoxStream<'static, RawLog>, ChainError> {
        let filter = Filter::new().address(address);
        let sub = self.primary.subscribe_logs(&filter).await.map_err(transport)?;
        Ok(sub.into_stream().map(RawLog::from).boxed())
    }
}
