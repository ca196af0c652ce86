// src/testing.rs
//! Scripted chain and in-memory sink for unit tests.

use crate::cache::ContractCache;
use crate::error::{CacheError, ChainError, PersistError};
use crate::exchange::ExchangeDescriptor;
use crate::models::{ContractRow, DiscoveredContract, PoolCreationRecord};
use crate::rpc::{ChainBlock, ChainReader, HeadNotice, RawLog};
use crate::sink::Sink;
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Runtime code that dispatches on the three essential ERC20 selectors.
pub fn token_bytecode() -> Bytes {
    let mut code = vec![0x60, 0x80, 0x60, 0x40, 0x52];
    for sig in ["totalSupply()", "balanceOf(address)", "transfer(address,uint256)"] {
        code.push(0x63); // PUSH4
        code.extend(selector(sig));
        code.push(0x14); // EQ
    }
    Bytes::from(code)
}

pub fn pair_created_log(
    descriptor: &ExchangeDescriptor,
    token0: Address,
    token1: Address,
    pair: Address,
    all_pairs_length: u64,
) -> RawLog {
    RawLog {
        address: descriptor.factory,
        topics: vec![descriptor.event_id, token0.into_word(), token1.into_word()],
        data: (pair, U256::from(all_pairs_length)).abi_encode_params().into(),
        block_number: Some(100),
        transaction_hash: Some(B256::repeat_byte(0xab)),
        log_index: Some(3),
    }
}

pub fn pool_created_log(
    descriptor: &ExchangeDescriptor,
    token0: Address,
    token1: Address,
    pool: Address,
) -> RawLog {
    let fee = B256::from(U256::from(3000u32).to_be_bytes::<32>());
    RawLog {
        address: descriptor.factory,
        topics: vec![descriptor.event_id, token0.into_word(), token1.into_word(), fee],
        data: (60i32, pool).abi_encode_params().into(),
        block_number: Some(100),
        transaction_hash: Some(B256::repeat_byte(0xcd)),
        log_index: Some(0),
    }
}

fn rpc_error(what: &str) -> ChainError {
    ChainError::Transport(format!("mock: no response scripted for {what}"))
}

#[derive(Default)]
pub struct MockChain {
    code: HashMap<Address, Bytes>,
    calls: HashMap<(Address, [u8; 4]), Option<Bytes>>,
    traces: HashMap<B256, Box<RawValue>>,
    receipts: HashMap<B256, u64>,
    blocks: HashMap<B256, ChainBlock>,
    heads: Vec<HeadNotice>,
    logs: HashMap<Address, Vec<RawLog>>,
    failing_traces: AtomicU32,
    trace_calls: AtomicU32,
}

impl MockChain {
    pub fn with_code(mut self, address: Address, code: Bytes) -> Self {
        self.code.insert(address, code);
        self
    }

    /// `None` makes the call fail at the transport level.
    pub fn with_call(mut self, to: Address, selector: [u8; 4], response: Option<Bytes>) -> Self {
        self.calls.insert((to, selector), response);
        self
    }

    pub fn with_trace(self, tx: B256, trace: Value) -> Self {
        self.with_raw_trace(tx, to_raw_value(&trace).unwrap())
    }

    /// Tracer output exactly as the transport hands it over.
    pub fn with_raw_trace(mut self, tx: B256, trace: Box<RawValue>) -> Self {
        self.traces.insert(tx, trace);
        self
    }

    pub fn with_receipt(mut self, tx: B256, block_number: u64) -> Self {
        self.receipts.insert(tx, block_number);
        self
    }

    pub fn with_block(mut self, block: ChainBlock) -> Self {
        self.heads.push(HeadNotice {
            number: block.number,
            hash: block.hash,
            miner: Address::ZERO,
        });
        self.blocks.insert(block.hash, block);
        self
    }

    pub fn with_logs(mut self, address: Address, logs: Vec<RawLog>) -> Self {
        self.logs.entry(address).or_default().extend(logs);
        self
    }

    /// Make the next `n` trace requests fail.
    pub fn fail_next_traces(&self, n: u32) {
        self.failing_traces.store(n, Ordering::SeqCst);
    }

    pub fn trace_calls(&self) -> u32 {
        self.trace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn subscribe_heads(&self) -> Result<BoxStream<'static, HeadNotice>, ChainError> {
        Ok(stream::iter(self.heads.clone()).boxed())
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Option<ChainBlock>, ChainError> {
        Ok(self.blocks.get(&hash).cloned())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        self.code
            .get(&address)
            .cloned()
            .ok_or_else(|| rpc_error("eth_getCode"))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&input[..4]);
        match self.calls.get(&(to, sel)) {
            Some(Some(output)) => Ok(output.clone()),
            _ => Err(rpc_error("eth_call")),
        }
    }

    async fn receipt_block_number(&self, tx: B256) -> Result<Option<u64>, ChainError> {
        Ok(self.receipts.get(&tx).copied())
    }

    async fn trace_call_tree(&self, tx: B256) -> Result<Box<RawValue>, ChainError> {
        self.trace_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_traces.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_traces.store(failing - 1, Ordering::SeqCst);
            return Err(ChainError::Transport("mock: node hiccup".into()));
        }
        self.traces
            .get(&tx)
            .cloned()
            .ok_or_else(|| rpc_error("debug_traceTransaction"))
    }

    async fn subscribe_logs(
        &self,
        address: Address,
    ) -> Result<BoxStream<'static, RawLog>, ChainError> {
        let logs = self.logs.get(&address).cloned().unwrap_or_default();
        Ok(stream::iter(logs).boxed())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    contracts: Mutex<Vec<DiscoveredContract>>,
    pools: Mutex<Vec<PoolCreationRecord>>,
}

impl RecordingSink {
    pub fn contracts(&self) -> Vec<DiscoveredContract> {
        self.contracts.lock().unwrap().clone()
    }

    pub fn pools(&self) -> Vec<PoolCreationRecord> {
        self.pools.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn save_contract(&self, contract: &DiscoveredContract) -> Result<(), PersistError> {
        self.contracts.lock().unwrap().push(contract.clone());
        Ok(())
    }

    async fn save_pool(&self, pool: &PoolCreationRecord) -> Result<(), PersistError> {
        self.pools.lock().unwrap().push(pool.clone());
        Ok(())
    }
}

/// Cache double that keeps every row it is asked to store.
#[derive(Default)]
pub struct RecordingCache {
    rows: Mutex<Vec<ContractRow>>,
    failing: bool,
}

impl RecordingCache {
    /// Records the attempt, then reports the cache as unreachable.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<ContractRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContractCache for RecordingCache {
    async fn put_contract(&self, row: &ContractRow) -> Result<(), CacheError> {
        self.rows.lock().unwrap().push(row.clone());
        if self.failing {
            let down = (redis::ErrorKind::IoError, "connection refused");
            return Err(redis::RedisError::from(down).into());
        }
        Ok(())
    }
}
