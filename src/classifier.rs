// src/classifier.rs
//! Bytecode heuristic for spotting ERC20 tokens.
//!
//! This is a substring search over the hex-encoded runtime code, not an ABI
//! check. It can report false positives (the selector bytes show up by
//! coincidence, possibly straddling an opcode boundary) and false negatives
//! (proxies whose runtime code does not embed the token's selectors).
//! Consumers of discovered contracts must tolerate both.

use crate::error::ClassifyError;
use crate::rpc::ChainReader;
use alloy::primitives::{Address, Bytes};

/// totalSupply(), balanceOf(address), transfer(address,uint256)
pub const ESSENTIAL_SELECTORS: [&str; 3] = ["18160ddd", "70a08231", "a9059cbb"];

#[derive(Debug, Clone)]
pub struct Classification {
    pub bytecode: Bytes,
    pub is_erc20: bool,
}

/// True when every essential selector appears in the bytecode.
pub fn has_erc20_selectors(bytecode: &[u8]) -> bool {
    if bytecode.is_empty() {
        return false;
    }
    let code = hex::encode(bytecode);
    ESSENTIAL_SELECTORS.iter().all(|s| code.contains(s))
}

/// Fetch the code at `address` (latest block) and classify it.
pub async fn classify(
    chain: &dyn ChainReader,
    address: Address,
) -> Result<Classification, ClassifyError> {
    let bytecode = chain
        .code_at(address)
        .await
        .map_err(|source| ClassifyError { address, source })?;

    let is_erc20 = has_erc20_selectors(&bytecode);
    Ok(Classification { bytecode, is_erc20 })
}
