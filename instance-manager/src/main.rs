//! `redis-instance`: startup cleanup and health-check sidecar for Redis and
//! Valkey pods managed by the failover operator.
//!
//! Grounded in `original_source/cmd/instance/*`. The Go original runs as
//! PID 1 and supervises a child `redis-server` process (zombie reaper,
//! SIGTERM/SIGKILL escalation); this binary only performs the startup RDB
//! cleanup and the health-check HTTP server against an already-running
//! Redis, per `SPEC_FULL.md` §6.

mod cleanup;
mod error;
mod health;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::routing::get;
use clap::{Parser, Subcommand};

use health::HealthState;

const DEFAULT_DATA_DIR: &str = "/data";
const DEFAULT_DB_FILENAME: &str = "dump.rdb";
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "redis-instance", about = "Redis instance manager for the failover operator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean up stale RDB tempfiles before Redis starts.
    Cleanup {
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
        #[arg(long, default_value = DEFAULT_DB_FILENAME)]
        db_filename: String,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Run startup cleanup then serve health-check endpoints for an
    /// already-running Redis.
    Run {
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
        #[arg(long, default_value = DEFAULT_DB_FILENAME)]
        db_filename: String,
        #[arg(long, default_value_t = 8080)]
        health_port: u16,
        #[arg(long, default_value_t = 6379)]
        redis_port: u16,
        #[arg(long, env = "REDIS_PASSWORD")]
        redis_password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Cleanup { data_dir, db_filename, dry_run } => {
            let report = cleanup::run_cleanup(&data_dir, &db_filename, dry_run)?;
            let action = if dry_run { "would delete" } else { "deleted" };
            if report.removed.is_empty() {
                tracing::info!("no stale RDB files found");
            } else {
                tracing::info!(
                    count = report.removed.len(),
                    bytes_freed = report.bytes_freed,
                    "{action} {} stale RDB file(s)",
                    report.removed.len()
                );
            }
            Ok(())
        }
        Command::Run { data_dir, db_filename, health_port, redis_port, redis_password } => {
            run(data_dir, db_filename, health_port, redis_port, redis_password).await
        }
    }
}

async fn run(
    data_dir: PathBuf,
    db_filename: String,
    health_port: u16,
    redis_port: u16,
    redis_password: Option<String>,
) -> anyhow::Result<()> {
    tracing::info!("redis-instance: starting instance manager");

    let cleanup_ok = match cleanup::run_cleanup(&data_dir, &db_filename, false) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(%err, "startup cleanup failed, continuing anyway");
            false
        }
    };

    let state = HealthState::new(redis_port, redis_password);
    state.set_cleanup_done(cleanup_ok);

    let poller = tokio::spawn(state.clone().run_poll_loop(HEALTH_CHECK_INTERVAL));

    let app = axum::Router::new()
        .route("/healthz", get(health::handle_healthz))
        .route("/readyz", get(health::handle_readyz))
        .route("/status", get(health::handle_status))
        .with_state(state);

    let addr: SocketAddr = ([0, 0, 0, 0], health_port).into();
    tracing::info!(%addr, "health server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    poller.abort();
    Ok(())
}
