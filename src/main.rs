mod cache;
mod classifier;
mod config;
mod db;
mod error;
mod exchange;
mod indexer;
mod listener;
mod metadata;
mod models;
mod parser;
mod retry;
mod rpc;
mod sink;
mod throttle;
mod trace;

#[cfg(test)]
mod testing;

use crate::cache::{Cache, ContractCache};
use crate::error::TaskError;
use crate::exchange::ExchangeKind;
use crate::indexer::BlockScraper;
use crate::metadata::MetadataFetcher;
use crate::retry::RetryPolicy;
use crate::rpc::{AlloyChain, ChainReader};
use crate::sink::{Gateway, Sink};
use crate::throttle::Throttle;
use crate::trace::Tracer;
use clap::Parser;
use std::sync::Arc;
use tokio::{signal, task::JoinSet};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = config::Args::parse();

    // RUST_LOG wins over --verbose
    let default_filter = if args.verbose { "info,snipr=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("snipr starting...");
    let cfg = config::load(&args)?;

    let alloy_chain = AlloyChain::connect(&cfg.node_url_wss, &cfg.node_url_http).await?;
    let chain_id = alloy_chain.chain_id().await?;
    info!("Chain ID: {}", chain_id);
    let chain: Arc<dyn ChainReader> = Arc::new(alloy_chain);

    let sink: Arc<dyn Sink> = if cfg.disable_db {
        warn!("Persistence disabled (--disable-db)");
        Arc::new(Gateway::disabled())
    } else {
        let store = db::Store::open(&cfg.db_path)?;
        info!(
            "Connection to SQLite was successful ({}): {} contracts, {} pools on record",
            cfg.db_path,
            store.contract_count()?,
            store.pool_count()?
        );
        let cache: Arc<dyn ContractCache> = Arc::new(Cache::connect(&cfg.redis_url).await?);
        Arc::new(Gateway::new(Some(store), Some(cache)))
    };

    let mut tasks: JoinSet<(&'static str, Result<(), TaskError>)> = JoinSet::new();

    let scraper = BlockScraper::new(
        chain.clone(),
        sink.clone(),
        Tracer::new(chain.clone(), RetryPolicy::linear()),
        MetadataFetcher::new(chain.clone())?,
        Throttle::every(cfg.block_throttle),
    );
    tasks.spawn({
        let chain = chain.clone();
        async move { ("block scraper", indexer::run(chain, scraper).await) }
    });

    for kind in ExchangeKind::ALL {
        let chain = chain.clone();
        let sink = sink.clone();
        let throttle = Throttle::every(cfg.log_throttle);
        tasks.spawn(async move {
            let result =
                listener::listen(kind.name(), kind.factory(), kind.abi(), chain, sink, throttle)
                    .await;
            (kind.name(), result)
        });
    }

    // a task ending never takes its siblings down
    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(Ok((name, Ok(())))) => info!("{} exited cleanly", name),
                Some(Ok((name, Err(e)))) => error!("{} stopped: {}", name, e),
                Some(Err(e)) => error!("Task panicked: {:?}", e),
                None => {
                    info!("All tasks have stopped");
                    break;
                }
            },
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received, stopping...");
                break;
            }
        }
    }

    info!("snipr stopped.");
    Ok(())
}
