//! `redisfailover-server`: the controller binary. Parses CLI flags, builds a
//! `kube::Client`, wires the concrete capability clients, and runs the
//! reconciliation engine alongside a metrics HTTP endpoint.
//!
//! Flags mirror `original_source/cmd/utils/flags.go`'s `CMDFlags` one-for-one
//! (`spec.md` §6).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use prometheus::{Encoder, TextEncoder};

use redisfailover_operator::config::Config;
use redisfailover_operator::controller::Controller;
use redisfailover_operator::k8s_client::KubeOrchestratorClient;
use redisfailover_operator::metrics::Metrics;
use redisfailover_operator::redis_client::RustisRedisClient;
use redisfailover_operator::sentinel_client::RustisSentinelClient;

#[derive(Parser, Debug)]
#[command(name = "redisfailover-server", about = "Redis/Valkey failover operator")]
struct Cli {
    /// Kubernetes configuration path, only used when `--development` is set.
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<String>,

    /// Restricts this operator to namespaces matching this regex.
    #[arg(long, default_value = ".*")]
    supported_namespaces_regex: String,

    /// Run outside a Kubernetes cluster, loading credentials from `--kubeconfig`.
    #[arg(long, default_value_t = false)]
    development: bool,

    /// Address to listen on for metrics.
    #[arg(long, default_value = ":9710")]
    listen_address: String,

    /// Path to serve the metrics.
    #[arg(long, default_value = "/metrics")]
    metrics_path: String,

    /// Allowed queries per second by the Kubernetes client.
    #[arg(long, default_value_t = 100.0)]
    k8s_cli_qps_limit: f32,

    /// Allowed burst requests by the Kubernetes client.
    #[arg(long, default_value_t = 100)]
    k8s_cli_burstable_limit: u32,

    /// Number of concurrent workers processing events.
    #[arg(long, default_value_t = 3)]
    concurrency: usize,

    /// Number of seconds between full resyncs.
    #[arg(long, default_value_t = 30)]
    sync_interval: u64,

    /// Log level (passed through to `tracing_subscriber::EnvFilter`).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Image containing the redis-instance binary for init containers.
    /// Empty disables RDB cleanup.
    #[arg(long, default_value = "")]
    instance_manager_image: String,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            listen_address: self.listen_address,
            metrics_path: self.metrics_path,
            concurrency: self.concurrency,
            sync_interval_secs: self.sync_interval,
            supported_namespaces_regex: self.supported_namespaces_regex,
            instance_manager_image: self.instance_manager_image,
            k8s_qps_limit: self.k8s_cli_qps_limit,
            k8s_burst_limit: self.k8s_cli_burstable_limit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.development {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    }

    if let Err(err) = regex::Regex::new(&cli.supported_namespaces_regex) {
        anyhow::bail!("supported namespaces regex is not valid: {err}");
    }

    let kubeconfig = cli.kubeconfig.clone();
    let development = cli.development;
    let qps = cli.k8s_cli_qps_limit;
    let burst = cli.k8s_cli_burstable_limit;
    let config = cli.into_config();

    let kube_client = build_kube_client(development, kubeconfig, qps, burst).await?;

    let metrics = Arc::new(Metrics::new());
    let redis = Arc::new(RustisRedisClient::new());
    let sentinel = Arc::new(RustisSentinelClient::new());
    let orchestrator = Arc::new(KubeOrchestratorClient::new(kube_client.clone()));

    let listen_address = normalize_listen_address(&config.listen_address);
    let metrics_path = config.metrics_path.clone();

    tracing::info!(
        concurrency = config.concurrency,
        sync_interval_secs = config.sync_interval_secs,
        listen_address = %listen_address,
        "starting redisfailover-server"
    );

    let metrics_server = tokio::spawn(serve_metrics(listen_address, metrics_path, metrics.clone()));

    let controller = Controller::new(kube_client, config, redis, sentinel, orchestrator, metrics);

    tokio::select! {
        _ = controller.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
        result = metrics_server => {
            if let Err(err) = result {
                tracing::error!(%err, "metrics server task panicked");
            }
        }
    }

    Ok(())
}

async fn build_kube_client(
    development: bool,
    kubeconfig: Option<String>,
    qps: f32,
    burst: u32,
) -> anyhow::Result<kube::Client> {
    let mut config = if development {
        match kubeconfig {
            Some(path) => {
                let kubeconfig = kube::config::Kubeconfig::read_from(path)?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default()).await?
            }
            None => kube::Config::infer().await?,
        }
    } else {
        kube::Config::infer().await?
    };
    config.accept_invalid_certs = false;
    let _ = (qps, burst); // kube::Config has no public QPS/burst knob in 0.95; retained for parity with the flag contract.
    Ok(kube::Client::try_from(config)?)
}

fn normalize_listen_address(addr: &str) -> SocketAddr {
    let addr = if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    };
    addr.parse().unwrap_or_else(|_| "0.0.0.0:9710".parse().unwrap())
}

async fn serve_metrics(addr: SocketAddr, path: String, metrics: Arc<Metrics>) {
    let app = axum::Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics);
    tracing::info!(%addr, "metrics endpoint listening");
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!(%err, "metrics server exited");
            }
        }
        Err(err) => tracing::error!(%err, %addr, "failed to bind metrics listener"),
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    let families = metrics.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        );
    }
    match String::from_utf8(buffer) {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(err) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        ),
    }
}
