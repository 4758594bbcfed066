//! EmberKV - An Off-Heap Key-Value Store
//!
//! This is the main entry point for the EmberKV server.
//! It sets up logging, the storage engine, the expiry sweeper and the TCP
//! listener, then serves connections until Ctrl+C.

use anyhow::{bail, Context};
use emberkv::commands::CommandHandler;
use emberkv::connection::{handle_connection, ConnectionStats};
use emberkv::storage::{
    start_expiry_sweeper, EngineConfig, EvictionConfig, EvictionPolicy, StorageEngine,
    DEFAULT_SHARDS,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug)]
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Storage engine settings
    engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: emberkv::DEFAULT_HOST.to_string(),
            port: emberkv::DEFAULT_PORT,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut config = Config::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .with_context(|| format!("{} requires a value", name))
            };

            match arg.as_str() {
                "--host" | "-h" => config.host = value("--host")?,
                "--port" | "-p" => {
                    config.port = value("--port")?
                        .parse()
                        .context("invalid port number")?;
                }
                "--shards" => {
                    let shards: usize = value("--shards")?
                        .parse()
                        .context("invalid shard count")?;
                    if shards == 0 {
                        bail!("--shards must be at least 1");
                    }
                    config.engine.shards = shards;
                }
                "--maxmemory" => {
                    config.engine.eviction.max_off_heap_size = value("--maxmemory")?
                        .parse()
                        .context("invalid --maxmemory byte count")?;
                }
                "--eviction-policy" => {
                    config.engine.eviction.policy = value("--eviction-policy")?
                        .parse::<EvictionPolicy>()
                        .map_err(anyhow::Error::msg)?;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("EmberKV version {}", emberkv::VERSION);
                    std::process::exit(0);
                }
                other => {
                    print_help();
                    bail!("unknown argument: {}", other);
                }
            }
        }

        Ok(config)
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
EmberKV - An Off-Heap Key-Value Store

USAGE:
    emberkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>               Host to bind to (default: {host})
    -p, --port <PORT>               Port to listen on (default: {port})
        --shards <N>                Number of key space shards (default: {shards})
        --maxmemory <BYTES>         Off-heap budget, 0 for unlimited (default: 0)
        --eviction-policy <NAME>    noeviction | volatile-random (default: noeviction)
    -v, --version                   Print version information
        --help                      Print this help message

LOGGING:
    Set RUST_LOG to change verbosity, e.g. RUST_LOG=emberkv=debug

CONNECTING:
    $ nc 127.0.0.1 {port}
    set name Ariz
    OK
    get name
    Ariz
    sadd ids 42
    (1)
"#,
        host = emberkv::DEFAULT_HOST,
        port = emberkv::DEFAULT_PORT,
        shards = DEFAULT_SHARDS,
    );
}

fn print_banner(config: &Config) {
    let EvictionConfig {
        policy,
        max_off_heap_size,
    } = config.engine.eviction;

    println!(
        r#"
EmberKV v{} - Off-Heap Key-Value Store
──────────────────────────────────────────────────────────────
Server started on {}
Shards: {}   Eviction: {} (max {} bytes)
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        emberkv::VERSION,
        config.bind_address(),
        config.engine.shards,
        policy,
        max_off_heap_size,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args()?;

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::with_config(config.engine));
    info!(
        shards = storage.shard_count(),
        policy = %config.engine.eviction.policy,
        max_off_heap_size = config.engine.eviction.max_off_heap_size,
        "Storage engine initialized"
    );

    let sweeper = start_expiry_sweeper(Arc::clone(&storage));

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, storage, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    let totals = stats.snapshot();
    info!(
        connections = totals.accepted,
        commands = totals.commands,
        bytes_in = totals.bytes_in,
        bytes_out = totals.bytes_out,
        "Session totals"
    );
    sweeper.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Accepts clients forever, one session task each.
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "Accept failed");
                continue;
            }
        };

        let commands = CommandHandler::new(Arc::clone(&storage));
        tokio::spawn(handle_connection(stream, peer, commands, Arc::clone(&stats)));
    }
}
