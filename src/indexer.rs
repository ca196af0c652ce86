use crate::classifier::classify;
use crate::error::{ChainError, ClassifyError, MetadataError, TaskError};
use crate::metadata::MetadataFetcher;
use crate::models::DiscoveredContract;
use crate::rpc::{ChainBlock, ChainReader, ChainTx};
use crate::sink::Sink;
use crate::throttle::Throttle;
use crate::trace::Tracer;
use alloy::primitives::Address;
use futures_util::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a created contract was dropped.
#[derive(Debug, Error)]
enum CandidateError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("could not get token details: {0}")]
    Metadata(#[from] MetadataError),

    #[error("failed to get transaction receipt: {0}")]
    Receipt(ChainError),

    #[error("transaction receipt not found")]
    ReceiptMissing,

    #[error("failed to recover sender from transaction")]
    Sender,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub transactions: usize,
    pub candidates: usize,
    pub tokens: usize,
}

/// Walks a block's transactions in order and persists every new ERC20 token
/// deployed by them, including contracts deployed by other contracts.
pub struct BlockScraper {
    chain: Arc<dyn ChainReader>,
    sink: Arc<dyn Sink>,
    tracer: Tracer,
    metadata: MetadataFetcher,
    throttle: Throttle,
}

impl BlockScraper {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        sink: Arc<dyn Sink>,
        tracer: Tracer,
        metadata: MetadataFetcher,
        throttle: Throttle,
    ) -> Self {
        Self {
            chain,
            sink,
            tracer,
            metadata,
            throttle,
        }
    }

    /// One transaction at a time, each fully processed before the next.
    pub async fn scrape_block(&self, block: &ChainBlock) -> ScrapeSummary {
        let mut summary = ScrapeSummary::default();

        for tx in &block.transactions {
            let (candidates, tokens) = self.scrape_transaction(tx).await;
            summary.transactions += 1;
            summary.candidates += candidates;
            summary.tokens += tokens;

            self.throttle.wait().await;
        }

        summary
    }

    /// Returns (contracts created, tokens persisted).
    async fn scrape_transaction(&self, tx: &ChainTx) -> (usize, usize) {
        debug!("🔍 Analyzing transaction: {}", tx.hash);

        let contracts = match self.tracer.find_created_contracts(tx.hash).await {
            Ok(contracts) => contracts,
            Err(e) => {
                warn!("Failed to find created contracts: {}", e);
                return (0, 0);
            }
        };

        if contracts.is_empty() {
            debug!("No new contracts were created in {}", tx.hash);
            return (0, 0);
        }

        let mut persisted = 0;
        for address in &contracts {
            info!("Analyzing {} (tx {})...", address, tx.hash);

            let contract = match self.inspect(tx, *address).await {
                Ok(Some(contract)) => contract,
                Ok(None) => {
                    info!("{} does not appear to be an ERC20 token", address);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", address, e);
                    continue;
                }
            };

            match self.sink.save_contract(&contract).await {
                Ok(()) => {
                    info!(
                        "Saved {} (erc20={}, block {})",
                        contract.address, contract.is_erc20, contract.block_number
                    );
                    persisted += 1;
                }
                Err(e) => warn!("Failed to persist {}: {}", address, e),
            }
        }

        (contracts.len(), persisted)
    }

    async fn inspect(
        &self,
        tx: &ChainTx,
        address: Address,
    ) -> Result<Option<DiscoveredContract>, CandidateError> {
        let classification = classify(self.chain.as_ref(), address).await?;
        if !classification.is_erc20 {
            return Ok(None);
        }

        info!("📝 {} is an ERC20 token! Fetching details...", address);
        let token = self.metadata.fetch(address).await?;
        info!(
            "    name={} symbol={} total_supply={} decimals={}",
            token.name, token.symbol, token.total_supply, token.decimals
        );

        let block_number = self
            .chain
            .receipt_block_number(tx.hash)
            .await
            .map_err(CandidateError::Receipt)?
            .ok_or(CandidateError::ReceiptMissing)?;

        let creator = tx.sender.ok_or(CandidateError::Sender)?;

        Ok(Some(DiscoveredContract {
            address,
            creator,
            transaction_hash: tx.hash,
            block_number,
            symbol: token.symbol,
            bytecode: classification.bytecode,
            total_supply: token.total_supply,
            decimals: token.decimals,
            is_erc20: classification.is_erc20,
        }))
    }
}

/// Follow new heads and scrape each block before accepting the next header.
/// Only returns when the subscription fails.
pub async fn run(chain: Arc<dyn ChainReader>, scraper: BlockScraper) -> Result<(), TaskError> {
    let mut heads = chain.subscribe_heads().await?;
    info!("Subscribed to new heads");

    while let Some(head) = heads.next().await {
        info!("----------------------------------------");
        info!("📦 New Block! number={} hash={} miner={}", head.number, head.hash, head.miner);

        let block = match chain.block_by_hash(head.hash).await {
            Ok(Some(block)) => block,
            Ok(None) => {
                warn!("Block {} not found", head.hash);
                continue;
            }
            Err(e) => {
                warn!("Error getting block by hash: {}", e);
                continue;
            }
        };

        let summary = scraper.scrape_block(&block).await;
        info!(
            "Completed block {} → {} txs, {} new contracts, {} tokens",
            block.number, summary.transactions, summary.candidates, summary.tokens
        );
    }

    Err(ChainError::SubscriptionClosed("newHeads").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::{selector, token_bytecode, MockChain, RecordingSink};
    use alloy::primitives::{address, Bytes, B256, U256};
    use alloy::sol_types::SolValue;
    use serde_json::json;
    use std::time::{Duration, Instant};

    const TOKEN: Address = address!("00000000000000000000000000000000000000aa");
    const NOT_TOKEN: Address = address!("00000000000000000000000000000000000000bb");
    const DEPLOYER: Address = address!("00000000000000000000000000000000000000de");
    const FACTORY: Address = address!("00000000000000000000000000000000000000fa");

    fn double_create_trace() -> serde_json::Value {
        json!({
            "type": "CALL",
            "to": FACTORY.to_string(),
            "calls": [
                { "type": "CREATE2", "to": TOKEN.to_string() },
                { "type": "CREATE2", "to": NOT_TOKEN.to_string() }
            ]
        })
    }

    fn token_chain() -> MockChain {
        MockChain::default()
            .with_code(TOKEN, token_bytecode())
            .with_code(NOT_TOKEN, Bytes::from(vec![0x60, 0x80, 0x63, 0x18, 0x16, 0x0d, 0xdd]))
            .with_call(TOKEN, selector("name()"), Some("Pepe".to_string().abi_encode().into()))
            .with_call(TOKEN, selector("symbol()"), Some("PEPE".to_string().abi_encode().into()))
            .with_call(
                TOKEN,
                selector("totalSupply()"),
                Some(U256::from(420_690_000u64).abi_encode().into()),
            )
            .with_call(TOKEN, selector("decimals()"), Some(U256::from(18u8).abi_encode().into()))
    }

    fn block(number: u64, txs: Vec<ChainTx>) -> ChainBlock {
        ChainBlock {
            number,
            hash: B256::repeat_byte(number as u8),
            transactions: txs,
        }
    }

    fn tx(byte: u8) -> ChainTx {
        ChainTx {
            hash: B256::repeat_byte(byte),
            sender: Some(DEPLOYER),
        }
    }

    fn scraper(chain: Arc<MockChain>, sink: Arc<RecordingSink>) -> BlockScraper {
        BlockScraper::new(
            chain.clone(),
            sink,
            Tracer::new(chain.clone(), RetryPolicy::immediate(3)),
            MetadataFetcher::new(chain).unwrap(),
            Throttle::unlimited(),
        )
    }

    #[tokio::test]
    async fn persists_only_the_token_among_two_creations() {
        let t = tx(0x11);
        let chain = Arc::new(
            token_chain()
                .with_trace(t.hash, double_create_trace())
                .with_receipt(t.hash, 19_000_001),
        );
        let sink = Arc::new(RecordingSink::default());

        let summary = scraper(chain, sink.clone())
            .scrape_block(&block(1, vec![t.clone()]))
            .await;

        assert_eq!(
            summary,
            ScrapeSummary {
                transactions: 1,
                candidates: 2,
                tokens: 1
            }
        );
        let saved = sink.contracts();
        assert_eq!(saved.len(), 1);
        assert_eq!(
            saved[0],
            DiscoveredContract {
                address: TOKEN,
                creator: DEPLOYER,
                transaction_hash: t.hash,
                block_number: 19_000_001,
                symbol: "PEPE".into(),
                bytecode: token_bytecode(),
                total_supply: U256::from(420_690_000u64),
                decimals: 18,
                is_erc20: true,
            }
        );
    }

    #[tokio::test]
    async fn failing_transaction_does_not_stop_the_block() {
        let broken = tx(0x01); // no trace scripted
        let good = tx(0x02);
        let chain = Arc::new(
            token_chain()
                .with_trace(good.hash, double_create_trace())
                .with_receipt(good.hash, 7),
        );
        let sink = Arc::new(RecordingSink::default());

        let summary = scraper(chain.clone(), sink.clone())
            .scrape_block(&block(7, vec![broken, good]))
            .await;

        assert_eq!(summary.transactions, 2);
        assert_eq!(summary.tokens, 1);
        // 3 attempts for the broken tx, 1 for the good one
        assert_eq!(chain.trace_calls(), 4);
    }

    #[tokio::test]
    async fn missing_receipt_or_sender_skips_the_token() {
        let no_receipt = tx(0x03);
        let mut no_sender = tx(0x04);
        no_sender.sender = None;
        let chain = Arc::new(
            token_chain()
                .with_trace(no_receipt.hash, double_create_trace())
                .with_trace(no_sender.hash, double_create_trace())
                .with_receipt(no_sender.hash, 9),
        );
        let sink = Arc::new(RecordingSink::default());

        let summary = scraper(chain, sink.clone())
            .scrape_block(&block(9, vec![no_receipt, no_sender]))
            .await;

        assert_eq!(summary.candidates, 4);
        assert_eq!(summary.tokens, 0);
        assert!(sink.contracts().is_empty());
    }

    #[tokio::test]
    async fn follows_heads_until_the_subscription_ends() {
        let first = tx(0x21);
        let second = tx(0x22);
        let chain = Arc::new(
            token_chain()
                .with_trace(first.hash, json!({ "type": "CALL", "to": FACTORY.to_string() }))
                .with_trace(second.hash, double_create_trace())
                .with_receipt(second.hash, 2)
                .with_block(block(1, vec![first]))
                .with_block(block(2, vec![second])),
        );
        let sink = Arc::new(RecordingSink::default());

        let result = run(chain.clone(), scraper(chain, sink.clone())).await;

        assert!(matches!(
            result,
            Err(TaskError::Chain(ChainError::SubscriptionClosed(_)))
        ));
        let saved = sink.contracts();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].block_number, 2);
    }

    #[tokio::test]
    async fn waits_after_every_transaction() {
        let period = Duration::from_millis(40);
        let txs: Vec<ChainTx> = (0x31..0x35).map(tx).collect();
        let chain = txs.iter().fold(token_chain(), |chain, t| {
            chain.with_trace(t.hash, json!({ "type": "CALL", "to": FACTORY.to_string() }))
        });
        let chain = Arc::new(chain);
        let scraper = BlockScraper::new(
            chain.clone(),
            Arc::new(RecordingSink::default()),
            Tracer::new(chain.clone(), RetryPolicy::immediate(1)),
            MetadataFetcher::new(chain).unwrap(),
            Throttle::every(period),
        );

        let started = Instant::now();
        let summary = scraper.scrape_block(&block(3, txs)).await;

        assert_eq!(summary.transactions, 4);
        // first pass is free, the other three each wait a full period
        assert!(started.elapsed() >= period * 3 - Duration::from_millis(5));
    }
}
