//! Deposit Watcher Service
//!
//! Polls the ledger indexer for deposits to the configured addresses and
//! serves them over HTTP/SSE.
//!
//! Run modes:
//!   cargo run                          - Start watcher and API
//!   cargo run -- --interval 500        - Override poll interval (ms)
//!   cargo run -- --port 8080           - Override API port
//!   cargo run -- help                  - Show usage

use deposit_watcher::api::{self, AppState};
use deposit_watcher::common::{self, init_from_config, log_system_event, AppError, WatcherConfig};
use deposit_watcher::indexer::IndexerClient;
use deposit_watcher::watcher::{DepositWatcher, WatcherOptions};
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    if args
        .iter()
        .any(|a| matches!(a.as_str(), "help" | "--help" | "-h"))
    {
        print_usage();
        return;
    }

    if let Err(e) = run(&args).await {
        eprintln!("deposit-watcher: {} [{}]", e, e.error_code());
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Deposit Watcher - ledger deposit notifications");
    println!();
    println!("Usage:");
    println!("  deposit-watcher [--interval <ms>] [--port <port>]");
    println!();
    println!("Environment Variables:");
    println!("  INDEXER_URL           Indexer endpoint (default: http://localhost:8980)");
    println!("  INDEXER_TOKEN         Indexer API token");
    println!("  WATCH_ADDRESSES       Comma-separated addresses to watch");
    println!("  IGNORE_SENDERS        Comma-separated senders to ignore");
    println!("  POLL_INTERVAL_MS      Poll interval (default: 1000)");
    println!("  API_PORT              HTTP/SSE port (default: 3000)");
    println!("  LOG_LEVEL             trace, debug, info, warn, error (default: info)");
    println!("  LOG_FORMAT            json or pretty (default: pretty)");
}

/// Apply command-line overrides on top of the environment
fn apply_args(config: &mut WatcherConfig, args: &[String]) -> common::Result<()> {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--interval" if i + 1 < args.len() => {
                let ms: u64 = args[i + 1].parse().map_err(|_| {
                    AppError::validation(format!("bad --interval: {}", args[i + 1]))
                })?;
                if ms == 0 {
                    return Err(AppError::validation("--interval must be > 0"));
                }
                config.poll_interval = Duration::from_millis(ms);
                i += 2;
            }
            "--port" if i + 1 < args.len() => {
                config.api_port = args[i + 1].parse().map_err(|_| {
                    AppError::validation(format!("bad --port: {}", args[i + 1]))
                })?;
                i += 2;
            }
            other => {
                eprintln!("Warning: ignoring unknown argument {}", other);
                i += 1;
            }
        }
    }
    Ok(())
}

async fn run(args: &[String]) -> common::Result<()> {
    let mut config = WatcherConfig::from_env()?;
    apply_args(&mut config, args)?;

    init_from_config(&config)?;
    config.log_summary();

    if config.watch_addresses.is_empty() {
        tracing::warn!("no WATCH_ADDRESSES configured; add addresses via POST /api/addresses");
    }

    let client = IndexerClient::from_config(&config)?;
    let watcher = DepositWatcher::spawn(
        Arc::new(client),
        config.watch_addresses.clone(),
        config.ignore_senders.clone(),
        WatcherOptions::new(config.poll_interval),
    );

    let state = AppState::new(watcher.clone());

    // SSE connections never finish on their own, so the server is dropped
    // rather than drained on ctrl-c
    let result = tokio::select! {
        result = api::start_server(state.clone(), config.api_port) => result.map_err(AppError::from),
        _ = tokio::signal::ctrl_c() => {
            log_system_event("shutdown requested", serde_json::json!({}));
            Ok(())
        }
    };

    state.shutdown().await;
    tracing::info!(stats = %watcher.stats().await, "deposit watcher exited");

    result
}
