// src/parser.rs
use crate::error::DecodeError;
use crate::exchange::ExchangeDescriptor;
use crate::models::PoolCreationRecord;
use crate::rpc::RawLog;
use alloy::primitives::{Address, B256, U256};
use tracing::debug;

/// Body fields of a creation event, decoded only to prove the log is well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationBody {
    pub pool: Address,
    /// `allPairsLength` for pair factories; pool factories have none.
    pub sequence: Option<U256>,
}

fn topic_to_address(topic: &B256) -> Address {
    // indexed addresses are left-padded to 32 bytes
    Address::from_word(*topic)
}

fn decode_body(descriptor: &ExchangeDescriptor, data: &[u8]) -> Result<CreationBody, DecodeError> {
    let body_error = |reason: String| DecodeError::Body {
        event: descriptor.event_name,
        reason,
    };

    let decoded = descriptor
        .body
        .abi_decode_sequence(data)
        .map_err(|e| body_error(e.to_string()))?;
    let values = decoded.as_tuple().unwrap_or_default();

    let pool = values
        .iter()
        .find_map(|v| v.as_address())
        .ok_or_else(|| body_error("no pair/pool address in event body".to_string()))?;
    let sequence = values.iter().find_map(|v| v.as_uint()).map(|(v, _)| v);

    Ok(CreationBody { pool, sequence })
}

/// Decode a factory creation log. topic[1] is the created coin, topic[2] the
/// coin backing it. The caller has already matched topic[0].
pub fn decode_creation(
    descriptor: &ExchangeDescriptor,
    log: &RawLog,
) -> Result<PoolCreationRecord, DecodeError> {
    if log.topics.len() < 3 {
        return Err(DecodeError::MissingTopics(log.topics.len()));
    }

    let created_coin = topic_to_address(&log.topics[1]);
    let backing_coin = topic_to_address(&log.topics[2]);
    let body = decode_body(descriptor, &log.data)?;
    if let Some(n) = body.sequence {
        debug!("{}: pair #{} is {}", descriptor.exchange, n, body.pool);
    }

    Ok(PoolCreationRecord {
        exchange: descriptor.exchange,
        created_coin,
        backing_coin,
        pool: body.pool,
        transaction_hash: log.transaction_hash,
        block_number: log.block_number,
        log_index: log.log_index,
    })
}
