// src/metadata.rs
use crate::error::{ChainError, MetadataError};
use crate::models::TokenMetadata;
use crate::rpc::ChainReader;
use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};
use std::sync::Arc;
use tracing::debug;

/// Minimal ERC20 read ABI.
pub const ERC20_ABI: &str = r#"[{"constant":true,"inputs":[],"name":"name","outputs":[{"name":"","type":"string"}],"payable":false,"stateMutability":"view","type":"function"},{"constant":true,"inputs":[],"name":"symbol","outputs":[{"name":"","type":"string"}],"payable":false,"stateMutability":"view","type":"function"},{"constant":true,"inputs":[],"name":"totalSupply","outputs":[{"name":"","type":"uint256"}],"payable":false,"stateMutability":"view","type":"function"},{"constant":true,"inputs":[],"name":"decimals","outputs":[{"name":"","type":"uint8"}],"payable":false,"stateMutability":"view","type":"function"}]"#;

pub const NAME_FALLBACK: &str = "N/A";
pub const UNPARSABLE: &str = "Unparsable";
pub const DEFAULT_DECIMALS: u8 = 18;

enum ReadError {
    Call(ChainError),
    Decode(String),
}

#[derive(Clone)]
pub struct MetadataFetcher {
    chain: Arc<dyn ChainReader>,
    name: Function,
    symbol: Function,
    total_supply: Function,
    decimals: Function,
}

impl MetadataFetcher {
    pub fn new(chain: Arc<dyn ChainReader>) -> Result<Self> {
        let abi: JsonAbi = serde_json::from_str(ERC20_ABI)?;
        let function = |name: &str| -> Result<Function> {
            abi.function(name)
                .and_then(|f| f.first())
                .cloned()
                .ok_or_else(|| eyre!("ERC20 ABI is missing {}()", name))
        };

        Ok(Self {
            name: function("name")?,
            symbol: function("symbol")?,
            total_supply: function("totalSupply")?,
            decimals: function("decimals")?,
            chain,
        })
    }

    /// Single-attempt call of a zero-argument view function, first output value.
    async fn read(&self, token: Address, function: &Function) -> Result<DynSolValue, ReadError> {
        let input = function
            .abi_encode_input(&[])
            .map_err(|e| ReadError::Decode(e.to_string()))?;

        let output = self
            .chain
            .call(token, input.into())
            .await
            .map_err(ReadError::Call)?;

        function
            .abi_decode_output(&output)
            .map_err(|e| ReadError::Decode(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| ReadError::Decode("empty return data".to_string()))
    }

    async fn read_text(&self, token: Address, function: &Function) -> String {
        match self.read(token, function).await {
            Ok(value) => value
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| UNPARSABLE.to_string()),
            Err(ReadError::Call(e)) => {
                debug!("{}() call failed on {}: {}", function.name, token, e);
                NAME_FALLBACK.to_string()
            }
            Err(ReadError::Decode(e)) => {
                debug!("{}() on {} returned unparsable data: {}", function.name, token, e);
                UNPARSABLE.to_string()
            }
        }
    }

    async fn read_total_supply(&self, token: Address) -> Result<U256, MetadataError> {
        match self.read(token, &self.total_supply).await {
            Ok(value) => value.as_uint().map(|(v, _)| v).ok_or_else(|| {
                MetadataError::TotalSupplyDecode {
                    address: token,
                    reason: format!("expected uint256, got {:?}", value),
                }
            }),
            Err(ReadError::Call(source)) => Err(MetadataError::TotalSupplyCall {
                address: token,
                source,
            }),
            Err(ReadError::Decode(reason)) => Err(MetadataError::TotalSupplyDecode {
                address: token,
                reason,
            }),
        }
    }

    async fn read_decimals(&self, token: Address) -> u8 {
        match self.read(token, &self.decimals).await {
            Ok(value) => value
                .as_uint()
                .and_then(|(v, _)| u8::try_from(v).ok())
                .unwrap_or(DEFAULT_DECIMALS),
            Err(_) => DEFAULT_DECIMALS,
        }
    }

    /// name/symbol/decimals degrade to placeholders; totalSupply is required.
    pub async fn fetch(&self, token: Address) -> Result<TokenMetadata, MetadataError> {
        let name = self.read_text(token, &self.name).await;
        let symbol = self.read_text(token, &self.symbol).await;
        let total_supply = self.read_total_supply(token).await?;
        let decimals = self.read_decimals(token).await;

        Ok(TokenMetadata {
            name,
            symbol,
            total_supply,
            decimals,
        })
    }
}
