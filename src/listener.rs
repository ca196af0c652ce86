// src/listener.rs
use crate::error::{ChainError, TaskError};
use crate::exchange::ExchangeDescriptor;
use crate::parser::decode_creation;
use crate::rpc::{ChainReader, RawLog};
use crate::sink::Sink;
use crate::throttle::Throttle;
use alloy::primitives::Address;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Follows one exchange factory's logs and persists every pool it creates.
pub struct ExchangeListener {
    descriptor: Arc<ExchangeDescriptor>,
    chain: Arc<dyn ChainReader>,
    sink: Arc<dyn Sink>,
    throttle: Throttle,
}

impl ExchangeListener {
    pub fn new(
        descriptor: Arc<ExchangeDescriptor>,
        chain: Arc<dyn ChainReader>,
        sink: Arc<dyn Sink>,
        throttle: Throttle,
    ) -> Self {
        Self {
            descriptor,
            chain,
            sink,
            throttle,
        }
    }

    /// Returns only when the log subscription fails or closes.
    pub async fn run(self) -> Result<(), TaskError> {
        let d = &self.descriptor;
        let mut logs = self.chain.subscribe_logs(d.factory).await?;
        info!(
            "Listening for {} events on {} ({}, {} events in ABI)",
            d.event_name,
            d.factory,
            d.exchange,
            d.abi.events.len()
        );

        while let Some(log) = logs.next().await {
            self.handle(&log).await;
            // resume waiting whether or not the log matched
            self.throttle.wait().await;
        }

        warn!("Subscription ended for exchange {}", d.exchange);
        Err(ChainError::SubscriptionClosed("logs").into())
    }

    async fn handle(&self, log: &RawLog) {
        let d = &self.descriptor;
        if log.topics.first() != Some(&d.event_id) {
            debug!("{}: ignoring non-{} log from {}", d.exchange, d.event_name, log.address);
            return;
        }

        let record = match decode_creation(d, log) {
            Ok(record) => record,
            Err(e) => {
                warn!("{}: {}", d.exchange, e);
                return;
            }
        };

        info!(
            "Token created on {} - created coin: {}, backing coin: {}, pool: {}",
            record.exchange, record.created_coin, record.backing_coin, record.pool
        );

        if let Err(e) = self.sink.save_pool(&record).await {
            warn!("{}: failed to persist pool {}: {}", d.exchange, record.pool, e);
        }
    }
}

/// Build the exchange descriptor and follow its factory. A bad ABI or an ABI
/// without a recognized creation event stops here, before subscribing.
pub async fn listen(
    exchange: &'static str,
    factory: Address,
    abi_json: &str,
    chain: Arc<dyn ChainReader>,
    sink: Arc<dyn Sink>,
    throttle: Throttle,
) -> Result<(), TaskError> {
    info!("Connecting to exchange {} at {}", exchange, factory);
    let descriptor = ExchangeDescriptor::new(exchange, factory, abi_json)?;
    ExchangeListener::new(Arc::new(descriptor), chain, sink, throttle)
        .run()
        .await
}
