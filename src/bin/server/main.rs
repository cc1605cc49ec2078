//! Clima Gateway HTTP Server
//!
//! # Endpoints
//!
//! - `GET /historic` - Historical query (`from`, `to`, `granularity`, `stats`)
//! - `POST /ingest` - Ingest one reading
//! - `GET /daily` - Read one day's summary
//! - `POST /daily-summary` - Recompute one day's means
//! - `GET /health` - Health check
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration and print a summary
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` or the `CLIMA_CONFIG` environment variable (path to TOML file)
//! 2. `./application.toml` in current directory
//! 3. Default configuration
//!
//! Backend and summary store credentials are usually supplied through
//! `INFLUX_URL`, `INFLUX_ORG`, `INFLUX_BUCKET`, `INFLUX_TOKEN`, `SUPABASE_URL`
//! and `SUPABASE_SERVICE_ROLE_KEY`.

mod config;

use clap::{Parser, Subcommand};
use clima_gateway::{
    backend::{InfluxBackend, MemoryBackend, TimeSeriesBackend},
    config::ApplicationConfig,
    server::{build_router, AppState},
    services::{parse_schedule, DailySummaryScheduler},
    summary::{MemorySummaryStore, PostgrestStore, SummaryStore},
    util::sanitize_url,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{signal, sync::broadcast};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Definition
// =============================================================================

/// Clima Gateway - sensor telemetry gateway
#[derive(Parser)]
#[command(name = "clima-gateway")]
#[command(version)]
#[command(about = "Sensor telemetry gateway with historical query and aggregation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides CLIMA_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration file without starting the server
    CheckConfig,
}

// =============================================================================
// Setup
// =============================================================================

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Pick the time-series backend
///
/// Without any Influx settings the in-memory backend is used; a partial
/// configuration still selects Influx so requests report the missing keys.
fn build_backend(
    app_config: &ApplicationConfig,
) -> Result<Arc<dyn TimeSeriesBackend>, Box<dyn std::error::Error>> {
    let influx = &app_config.influx;
    if influx.is_unset() {
        warn!("No InfluxDB settings found, using in-memory backend");
        return Ok(Arc::new(MemoryBackend::new().with_pushdown(true)));
    }
    if let Some(url) = &influx.url {
        info!(url = %sanitize_url(url), bucket = ?influx.bucket, "Using InfluxDB backend");
    }
    if !influx.is_complete() {
        warn!(missing = ?influx.missing_keys(), "InfluxDB configuration incomplete");
    }
    Ok(Arc::new(InfluxBackend::new(influx.clone())?))
}

/// Pick the summary store, mirroring [`build_backend`]
fn build_summary_store(
    app_config: &ApplicationConfig,
) -> Result<Arc<dyn SummaryStore>, Box<dyn std::error::Error>> {
    let summary = &app_config.summary;
    if summary.is_unset() {
        warn!("No summary store settings found, using in-memory store");
        return Ok(Arc::new(MemorySummaryStore::new()));
    }
    if let Some(url) = &summary.url {
        info!(url = %sanitize_url(url), table = %summary.table, "Using PostgREST summary store");
    }
    if !summary.is_complete() {
        warn!(missing = ?summary.missing_keys(), "Summary store configuration incomplete");
    }
    Ok(Arc::new(PostgrestStore::new(summary.clone())?))
}

/// Graceful shutdown signal handler
///
/// Signal registration failures are logged and that signal source is
/// ignored; the server then has to be killed forcefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

fn load(cli: &Cli) -> Result<ApplicationConfig, Box<dyn std::error::Error>> {
    let mut app_config = config::load_config(cli.config.as_deref())?;
    if let Some(listen) = &cli.listen {
        app_config.server.listen_addr = listen.clone();
    }
    app_config.validate()?;
    Ok(app_config)
}

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let app_config = load(cli)?;
    let missing_or_ok = |missing: Vec<&'static str>| {
        if missing.is_empty() {
            "complete".to_string()
        } else {
            format!("missing {}", missing.join(", "))
        }
    };

    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", app_config.server.listen_addr);
    println!("  Log level: {}", app_config.server.log_level);
    println!("  Query mode: {}", app_config.query.mode);
    println!();
    println!("InfluxDB:");
    if let Some(url) = &app_config.influx.url {
        println!("  URL: {}", sanitize_url(url));
    }
    println!("  Measurement: {}", app_config.influx.measurement);
    println!("  Settings: {}", missing_or_ok(app_config.influx.missing_keys()));
    println!();
    println!("Summary Store:");
    if let Some(url) = &app_config.summary.url {
        println!("  URL: {}", sanitize_url(url));
    }
    println!("  Table: {}", app_config.summary.table);
    println!(
        "  Schedule (UTC): {}",
        app_config.summary.schedule_utc.as_deref().unwrap_or("disabled")
    );
    println!("  Settings: {}", missing_or_ok(app_config.summary.missing_keys()));

    Ok(())
}

/// Start the HTTP server
async fn cmd_start(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let app_config = load(cli)?;
    init_tracing(&app_config.server.log_level);

    let backend = build_backend(&app_config)?;
    let summaries = build_summary_store(&app_config)?;
    let state = Arc::new(AppState::new(backend, summaries, app_config.query.mode));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let scheduler = app_config
        .summary
        .schedule_utc
        .as_deref()
        .and_then(parse_schedule)
        .map(|at| {
            let scheduler = DailySummaryScheduler::new(state.daily_job.clone(), at);
            let rx = shutdown_tx.subscribe();
            tokio::spawn(async move { scheduler.start(rx).await })
        });

    let app = build_router(state.clone(), &app_config.server.cors_allowed_origins);
    let addr: SocketAddr = app_config.server.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        %addr,
        mode = %app_config.query.mode,
        backend = state.engine.backend_id(),
        summary_store = state.summaries.store_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Clima Gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!(error = %e, "Daily summary scheduler did not stop cleanly");
        }
    }

    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig) => cmd_check_config(&cli),
        Some(Commands::Start) | None => cmd_start(&cli).await,
    }
}
