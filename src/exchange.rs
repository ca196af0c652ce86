// src/exchange.rs
use crate::error::ExchangeError;
use alloy::dyn_abi::{DynSolType, Specifier};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{address, Address, B256};

/// Event names announcing a new pair/pool, in lookup priority order.
pub const EVENT_CANDIDATES: [&str; 2] = ["PoolCreated", "PairCreated"];

pub const UNISWAP_V2_FACTORY: Address = address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f");
pub const UNISWAP_V3_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");

pub const UNISWAP_V2_FACTORY_ABI: &str = r#"[{"inputs":[{"internalType":"address","name":"_feeToSetter","type":"address"}],"stateMutability":"nonpayable","type":"constructor"},{"anonymous":false,"inputs":[{"indexed":true,"internalType":"address","name":"token0","type":"address"},{"indexed":true,"internalType":"address","name":"token1","type":"address"},{"indexed":false,"internalType":"address","name":"pair","type":"address"},{"indexed":false,"internalType":"uint256","name":"allPairsLength","type":"uint256"}],"name":"PairCreated","type":"event"},{"inputs":[{"internalType":"uint256","name":"","type":"uint256"}],"name":"allPairs","outputs":[{"internalType":"address","name":"pair","type":"address"}],"stateMutability":"view","type":"function"},{"inputs":[],"name":"allPairsLength","outputs":[{"internalType":"uint256","name":"","type":"uint256"}],"stateMutability":"view","type":"function"},{"inputs":[{"internalType":"address","name":"tokenA","type":"address"},{"internalType":"address","name":"tokenB","type":"address"}],"name":"createPair","outputs":[{"internalType":"address","name":"pair","type":"address"}],"stateMutability":"nonpayable","type":"function"},{"inputs":[],"name":"feeTo","outputs":[{"internalType":"address","name":"","type":"address"}],"stateMutability":"view","type":"function"},{"inputs":[],"name":"feeToSetter","outputs":[{"internalType":"address","name":"","type":"address"}],"stateMutability":"view","type":"function"},{"inputs":[{"internalType":"address","name":"","type":"address"},{"internalType":"address","name":"","type":"address"}],"name":"getPair","outputs":[{"internalType":"address","name":"","type":"address"}],"stateMutability":"view","type":"function"},{"inputs":[{"internalType":"address","name":"_feeTo","type":"address"}],"name":"setFeeTo","stateMutability":"nonpayable","type":"function"},{"inputs":[{"internalType":"address","name":"_feeToSetter","type":"address"}],"name":"setFeeToSetter","stateMutability":"nonpayable","type":"function"}]"#;

pub const UNISWAP_V3_FACTORY_ABI: &str = r#"[{"inputs":[],"stateMutability":"nonpayable","type":"constructor"},{"anonymous":false,"inputs":[{"indexed":true,"internalType":"uint24","name":"fee","type":"uint24"},{"indexed":true,"internalType":"int24","name":"tickSpacing","type":"int24"}],"name":"FeeAmountEnabled","type":"event"},{"anonymous":false,"inputs":[{"indexed":true,"internalType":"address","name":"oldOwner","type":"address"},{"indexed":true,"internalType":"address","name":"newOwner","type":"address"}],"name":"OwnerChanged","type":"event"},{"anonymous":false,"inputs":[{"indexed":true,"internalType":"address","name":"token0","type":"address"},{"indexed":true,"internalType":"address","name":"token1","type":"address"},{"indexed":true,"internalType":"uint24","name":"fee","type":"uint24"},{"indexed":false,"internalType":"int24","name":"tickSpacing","type":"int24"},{"indexed":false,"internalType":"address","name":"pool","type":"address"}],"name":"PoolCreated","type":"event"},{"inputs":[{"internalType":"address","name":"tokenA","type":"address"},{"internalType":"address","name":"tokenB","type":"address"},{"internalType":"uint24","name":"fee","type":"uint24"}],"name":"createPool","outputs":[{"internalType":"address","name":"pool","type":"address"}],"stateMutability":"nonpayable","type":"function"},{"inputs":[{"internalType":"uint24","name":"fee","type":"uint24"},{"internalType":"int24","name":"tickSpacing","type":"int24"}],"name":"enableFeeAmount","outputs":[],"stateMutability":"nonpayable","type":"function"},{"inputs":[{"internalType":"uint24","name":"","type":"uint24"}],"name":"feeAmountTickSpacing","outputs":[{"internalType":"int24","name":"","type":"int24"}],"stateMutability":"view","type":"function"},{"inputs":[{"internalType":"address","name":"","type":"address"},{"internalType":"address","name":"","type":"address"},{"internalType":"uint24","name":"","type":"uint24"}],"name":"getPool","outputs":[{"internalType":"address","name":"","type":"address"}],"stateMutability":"view","type":"function"},{"inputs":[],"name":"owner","outputs":[{"internalType":"address","name":"","type":"address"}],"stateMutability":"view","type":"function"},{"inputs":[],"name":"parameters","outputs":[{"internalType":"address","name":"factory","type":"address"},{"internalType":"address","name":"token0","type":"address"},{"internalType":"address","name":"token1","type":"address"},{"internalType":"uint24","name":"fee","type":"uint24"},{"internalType":"int24","name":"tickSpacing","type":"int24"}],"stateMutability":"view","type":"function"},{"inputs":[{"internalType":"address","name":"_owner","type":"address"}],"name":"setOwner","outputs":[],"stateMutability":"nonpayable","type":"function"}]"#;

/// Exchange families the listener knows how to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Pair factories emitting `PairCreated`.
    UniswapV2,
    /// Pool factories emitting `PoolCreated`.
    UniswapV3,
}

impl ExchangeKind {
    pub const ALL: [ExchangeKind; 2] = [ExchangeKind::UniswapV2, ExchangeKind::UniswapV3];

    pub fn name(self) -> &'static str {
        match self {
            ExchangeKind::UniswapV2 => "Uniswap V2",
            ExchangeKind::UniswapV3 => "Uniswap V3",
        }
    }

    pub fn factory(self) -> Address {
        match self {
            ExchangeKind::UniswapV2 => UNISWAP_V2_FACTORY,
            ExchangeKind::UniswapV3 => UNISWAP_V3_FACTORY,
        }
    }

    pub fn abi(self) -> &'static str {
        match self {
            ExchangeKind::UniswapV2 => UNISWAP_V2_FACTORY_ABI,
            ExchangeKind::UniswapV3 => UNISWAP_V3_FACTORY_ABI,
        }
    }
}

/// First candidate event present in the ABI.
pub fn resolve_event_name(abi: &JsonAbi) -> Option<&'static str> {
    EVENT_CANDIDATES
        .into_iter()
        .find(|name| abi.event(name).is_some_and(|events| !events.is_empty()))
}

/// A factory to watch plus everything needed to decode its creation events.
/// Built once per listener, then only read.
#[derive(Debug, Clone)]
pub struct ExchangeDescriptor {
    pub exchange: &'static str,
    pub factory: Address,
    pub abi: JsonAbi,
    pub event_name: &'static str,
    /// keccak256 of the event signature, i.e. the expected topic0.
    pub event_id: B256,
    /// Tuple of the event's non-indexed inputs.
    pub body: DynSolType,
}

impl ExchangeDescriptor {
    #[cfg(test)]
    pub fn for_kind(kind: ExchangeKind) -> Result<Self, ExchangeError> {
        Self::new(kind.name(), kind.factory(), kind.abi())
    }

    pub fn new(
        exchange: &'static str,
        factory: Address,
        abi_json: &str,
    ) -> Result<Self, ExchangeError> {
        let abi_error = |reason: String| ExchangeError::Abi {
            exchange: exchange.to_string(),
            reason,
        };

        let abi: JsonAbi = serde_json::from_str(abi_json).map_err(|e| abi_error(e.to_string()))?;

        let event_name = resolve_event_name(&abi)
            .ok_or_else(|| ExchangeError::NoRecognizedEvent(exchange.to_string()))?;

        let event = abi
            .event(event_name)
            .and_then(|events| events.first())
            .ok_or_else(|| ExchangeError::NoRecognizedEvent(exchange.to_string()))?;

        let body = event
            .inputs
            .iter()
            .filter(|p| !p.indexed)
            .map(|p| p.resolve())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| abi_error(e.to_string()))?;

        Ok(Self {
            exchange,
            factory,
            event_id: event.selector(),
            body: DynSolType::Tuple(body),
            event_name,
            abi,
        })
    }
}
