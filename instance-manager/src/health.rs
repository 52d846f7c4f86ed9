//! Background Redis health poller and the `/healthz`, `/readyz`, `/status`
//! HTTP handlers, grounded in
//! `original_source/cmd/instance/run/health.go`. The PID-1 process
//! supervision in the same package (zombie reaper, signal escalation
//! around a child `redis-server`) is out of scope here: this binary only
//! watches an already-running Redis over the wire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rustis::client::{Client, IntoConfig};
use rustis::commands::{ConnectionCommands, InfoSection, ServerCommands};
use tokio::sync::RwLock;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

pub struct HealthState {
    redis_host: String,
    redis_port: u16,
    redis_password: Option<String>,
    start_time: Instant,
    cleanup_done: AtomicBool,
    redis_healthy: AtomicBool,
    redis_ready: AtomicBool,
    info: RwLock<HashMap<String, String>>,
}

impl HealthState {
    pub fn new(redis_port: u16, redis_password: Option<String>) -> Arc<Self> {
        Arc::new(HealthState {
            redis_host: "127.0.0.1".to_string(),
            redis_port,
            redis_password,
            start_time: Instant::now(),
            cleanup_done: AtomicBool::new(false),
            redis_healthy: AtomicBool::new(false),
            redis_ready: AtomicBool::new(false),
            info: RwLock::new(HashMap::new()),
        })
    }

    pub fn set_cleanup_done(&self, done: bool) {
        self.cleanup_done.store(done, Ordering::SeqCst);
    }

    fn uri(&self) -> String {
        match &self.redis_password {
            Some(pw) if !pw.is_empty() => {
                format!("redis://:{pw}@{}:{}", self.redis_host, self.redis_port)
            }
            _ => format!("redis://{}:{}", self.redis_host, self.redis_port),
        }
    }

    async fn connect(&self) -> Result<Client, rustis::Error> {
        let config = self.uri().into_config()?;
        tokio::time::timeout(CONNECT_TIMEOUT, Client::connect(config))
            .await
            .map_err(|_| rustis::Error::Client("connect timed out".to_string()))?
    }

    /// Pings Redis, then fetches `INFO` and caches its parsed fields.
    /// Errors are swallowed into the cached healthy/ready flags: this loop
    /// must never stop polling because one tick failed.
    async fn poll_once(&self) {
        let client = match self.connect().await {
            Ok(client) => client,
            Err(err) => {
                tracing::debug!(%err, "redis-instance: health check connect failed");
                self.redis_healthy.store(false, Ordering::SeqCst);
                self.redis_ready.store(false, Ordering::SeqCst);
                return;
            }
        };

        let ping: Result<Result<String, rustis::Error>, _> =
            tokio::time::timeout(COMMAND_TIMEOUT, client.ping(())).await;
        if !matches!(ping, Ok(Ok(_))) {
            self.redis_healthy.store(false, Ordering::SeqCst);
            self.redis_ready.store(false, Ordering::SeqCst);
            return;
        }
        self.redis_healthy.store(true, Ordering::SeqCst);

        let raw: Result<Result<String, rustis::Error>, _> =
            tokio::time::timeout(COMMAND_TIMEOUT, client.info([InfoSection::All])).await;
        let raw = match raw {
            Ok(Ok(raw)) => raw,
            _ => {
                self.redis_ready.store(false, Ordering::SeqCst);
                return;
            }
        };

        let parsed = parse_redis_info(&raw);
        let loading = parsed.get("loading").map(String::as_str) == Some("1");
        let sync_in_progress = parsed.get("master_sync_in_progress").map(String::as_str) == Some("1");
        let master_link_down = parsed.get("master_link_status").map(String::as_str) == Some("down");
        let is_replica = parsed.get("role").map(String::as_str) == Some("slave");

        let mut ready = !loading;
        if is_replica {
            ready = ready && !sync_in_progress && !master_link_down;
        }
        self.redis_ready.store(ready, Ordering::SeqCst);

        *self.info.write().await = parsed;
    }

    pub async fn run_poll_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    fn uptime_seconds(&self) -> i64 {
        self.start_time.elapsed().as_secs() as i64
    }
}

fn parse_redis_info(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), value.trim_end_matches('\r').to_string()))
        .collect()
}

fn parse_int(info: &HashMap<String, String>, key: &str) -> i64 {
    info.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

#[derive(serde::Serialize, Default)]
struct ReadyResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    role: String,
    connected_clients: i64,
    loading: bool,
    master_sync_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

#[derive(serde::Serialize)]
struct StatusResponse {
    redis: RedisStatus,
    replication: ReplicationStatus,
    instance_manager: InstanceManagerStatus,
}

#[derive(serde::Serialize, Default)]
struct RedisStatus {
    role: String,
    connected_clients: i64,
    used_memory: String,
    used_memory_human: String,
    loading: bool,
    rdb_bgsave_in_progress: bool,
    aof_rewrite_in_progress: bool,
}

#[derive(serde::Serialize, Default)]
struct ReplicationStatus {
    role: String,
    connected_slaves: i64,
    master_host: String,
    master_port: i64,
    master_link_status: String,
    master_sync_in_progress: bool,
    slave_repl_offset: i64,
    master_repl_offset: i64,
}

#[derive(serde::Serialize)]
struct InstanceManagerStatus {
    version: &'static str,
    uptime_seconds: i64,
    startup_cleanup_done: bool,
}

pub async fn handle_healthz(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let uptime_seconds = state.uptime_seconds();
    if state.redis_healthy.load(Ordering::SeqCst) {
        (
            StatusCode::OK,
            Json(HealthResponse { status: "ok", uptime_seconds, error: None }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                uptime_seconds,
                error: Some("redis not responding to PING"),
            }),
        )
    }
}

pub async fn handle_readyz(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let info = state.info.read().await;
    let loading = info.get("loading").map(String::as_str) == Some("1");
    let master_sync_in_progress = info.get("master_sync_in_progress").map(String::as_str) == Some("1");
    let master_link_down = info.get("master_link_status").map(String::as_str) == Some("down");
    let healthy = state.redis_healthy.load(Ordering::SeqCst);

    let mut resp = ReadyResponse {
        role: info.get("role").cloned().unwrap_or_default(),
        connected_clients: parse_int(&info, "connected_clients"),
        loading,
        master_sync_in_progress,
        ..Default::default()
    };

    if state.redis_ready.load(Ordering::SeqCst) {
        resp.status = "ok";
        (StatusCode::OK, Json(resp))
    } else {
        resp.status = "not ready";
        resp.error = Some(if loading {
            "redis is loading data"
        } else if master_sync_in_progress {
            "replica sync in progress"
        } else if master_link_down {
            "master link is down"
        } else if !healthy {
            "redis not responding"
        } else {
            "not ready"
        });
        (StatusCode::SERVICE_UNAVAILABLE, Json(resp))
    }
}

pub async fn handle_status(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let info = state.info.read().await;
    let role = info.get("role").cloned().unwrap_or_default();

    let resp = StatusResponse {
        redis: RedisStatus {
            role: role.clone(),
            connected_clients: parse_int(&info, "connected_clients"),
            used_memory: info.get("used_memory").cloned().unwrap_or_default(),
            used_memory_human: info.get("used_memory_human").cloned().unwrap_or_default(),
            loading: info.get("loading").map(String::as_str) == Some("1"),
            rdb_bgsave_in_progress: info.get("rdb_bgsave_in_progress").map(String::as_str) == Some("1"),
            aof_rewrite_in_progress: info.get("aof_rewrite_in_progress").map(String::as_str) == Some("1"),
        },
        replication: ReplicationStatus {
            role,
            connected_slaves: parse_int(&info, "connected_slaves"),
            master_host: info.get("master_host").cloned().unwrap_or_default(),
            master_port: parse_int(&info, "master_port"),
            master_link_status: info.get("master_link_status").cloned().unwrap_or_default(),
            master_sync_in_progress: info.get("master_sync_in_progress").map(String::as_str) == Some("1"),
            slave_repl_offset: parse_int(&info, "slave_repl_offset"),
            master_repl_offset: parse_int(&info, "master_repl_offset"),
        },
        instance_manager: InstanceManagerStatus {
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: state.uptime_seconds(),
            startup_cleanup_done: state.cleanup_done.load(Ordering::SeqCst),
        },
    };

    (StatusCode::OK, Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_info_lines_ignoring_comments_and_blanks() {
        let raw = "# Replication\r\nrole:master\r\nconnected_slaves:2\r\n\r\n# Persistence\r\nloading:0\r\n";
        let parsed = parse_redis_info(raw);
        assert_eq!(parsed.get("role").map(String::as_str), Some("master"));
        assert_eq!(parsed.get("connected_slaves").map(String::as_str), Some("2"));
        assert_eq!(parsed.get("loading").map(String::as_str), Some("0"));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn parse_int_defaults_to_zero_for_missing_or_malformed_keys() {
        let mut info = HashMap::new();
        info.insert("connected_clients".to_string(), "not-a-number".to_string());
        assert_eq!(parse_int(&info, "connected_clients"), 0);
        assert_eq!(parse_int(&info, "missing"), 0);
    }
}
