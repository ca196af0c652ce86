use clap::Parser;
use dotenvy::dotenv;
use eyre::{eyre, Result};
use std::{env, time::Duration};
use tracing::{info, warn};

/// Watches the chain for new ERC20 tokens and DEX pools.
#[derive(Debug, Clone, Parser)]
#[command(name = "snipr", version)]
pub struct Args {
    /// Do not write to SQLite or Redis; discoveries are only logged
    #[arg(long)]
    pub disable_db: bool,

    /// Debug-level logging for this crate
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node_url_wss: String,
    pub node_url_http: String,
    pub db_path: String,
    pub redis_url: String,
    pub disable_db: bool,
    pub block_throttle: Duration,
    pub log_throttle: Duration,
}

pub fn load(args: &Args) -> Result<Config> {
    dotenv().ok(); // load from .env file if present
    from_lookup(args, |key| env::var(key).ok())
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Duration {
    let ms = lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

fn from_lookup(args: &Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let node_url_wss = lookup("NODE_URL_WSS").filter(|s| !s.is_empty()).ok_or_else(|| {
        eyre!("NODE_URL_WSS is not set. This should be your WebSocket endpoint (e.g., wss://...)")
    })?;

    // debug_traceTransaction goes to the HTTP endpoint when there is one
    let node_url_http = match lookup("NODE_URL_HTTP").filter(|s| !s.is_empty()) {
        Some(url) => url,
        None => {
            warn!("NODE_URL_HTTP is not set. Falling back to NODE_URL_WSS for RPC calls. This may not work with all node providers.");
            node_url_wss.clone()
        }
    };

    let db_path = lookup("DATABASE_URL").unwrap_or_else(|| "snipr.db".to_string());

    let redis_host = lookup("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let redis_port = lookup("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
    let redis_url = format!("redis://{}:{}/", redis_host, redis_port);

    let cfg = Config {
        node_url_wss,
        node_url_http,
        db_path,
        redis_url,
        disable_db: args.disable_db,
        block_throttle: millis(&lookup, "BLOCK_THROTTLE_MS", 1000),
        log_throttle: millis(&lookup, "LOG_THROTTLE_MS", 5000),
    };

    info!("Loaded config: {:?}", cfg);
    Ok(cfg)
}
