//! sinkplot gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                       MANAGER                        │
//!                    │                                                      │
//!  POST /config ─────┼─▶ control ──▶ admission ──▶ compiler ──┐             │
//!  GET  /healthz     │                                        ▼             │
//!                    │                               DynamicHandler         │
//!                    │                              (ArcSwap<Chain>)        │
//!                    │                                        ▲             │
//!  Client ───────────┼─▶ worker listener 1..N ────────────────┘             │
//!                    │        │                                             │
//!                    │        └─▶ matcher chain ─▶ strategy ─▶ upstream ────┼──▶ Backend
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use sinkplot::admission::admit;
use sinkplot::config::load_config;
use sinkplot::config::watcher::ConfigWatcher;
use sinkplot::lifecycle::manager::DEFAULT_CONTROL_PORT;
use sinkplot::lifecycle::signals::spawn_shutdown_handler;
use sinkplot::observability::{logging, metrics};
use sinkplot::routing::compile;
use sinkplot::http::Transport;
use sinkplot::{Manager, ManagerOptions};

#[derive(Parser, Debug)]
#[command(name = "sinkplot")]
#[command(about = "Hot-reloadable HTTP reverse proxy", version)]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a config file and serve it
    Start(StartArgs),
    /// Admit and compile a config file without serving it
    Validate {
        #[arg(short, long)]
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct StartArgs {
    /// Config file (.json, .yaml, .yml or .toml)
    #[arg(short, long)]
    path: PathBuf,

    /// Port of the control endpoint
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Host worker listeners and the control endpoint bind on
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    #[arg(long, default_value_t = 5)]
    shutdown_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Reload the config file whenever it changes
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match cli.command {
        Commands::Start(args) => start(args).await,
        Commands::Validate { path } => {
            let config = load_config(&path)?;
            let app = admit(config.app)?;
            let chain = compile(&app, &Transport::default())?;
            tracing::info!(
                path = %path.display(),
                routes = chain.routes().len(),
                listeners = ?chain.listeners(),
                "Configuration is valid"
            );
            Ok(())
        }
    }
}

async fn start(args: StartArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("sinkplot v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.path)?;
    tracing::info!(
        path = %args.path.display(),
        app = %config.app.name,
        routes = config.app.routes.len(),
        sinks = config.app.sinks.len(),
        "Configuration loaded"
    );

    if let Some(addr) = args.metrics_address {
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(error = %e, address = %addr, "Failed to start metrics exporter");
        }
    }

    let options = ManagerOptions {
        bind_host: args.bind,
        control_address: SocketAddr::new(args.bind, args.control_port),
        shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
    };
    let manager = Manager::new(options);
    spawn_shutdown_handler(manager.shutdown_handle());

    // Keep the watcher alive for as long as the manager runs.
    let _watcher = if args.watch {
        let (watcher, updates) = ConfigWatcher::new(&args.path);
        let watcher = watcher.run()?;
        let reloader = manager.reloader().clone();
        let signal = manager.shutdown_handle().subscribe();
        tokio::spawn(async move { reloader.apply_updates(updates, signal).await });
        Some(watcher)
    } else {
        None
    };

    manager.start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
