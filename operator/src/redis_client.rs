//! Redis wire-protocol capability interface.
//!
//! `spec.md` §1 treats the Redis/Sentinel wire client as an external
//! collaborator, "contract-level only". This module defines that contract
//! as a trait (so the checker/healer never touch a concrete client) and a
//! thin implementation on top of `rustis` (one of this corpus's own
//! production Redis drivers), connecting per-call with the bounded
//! timeouts from `spec.md` §5 (2s connect, 1s per command).

use async_trait::async_trait;
use rustis::client::{Client, IntoConfig};
use rustis::commands::{ConnectionCommands, InfoSection, ReplicaOfOptions, RoleResult, ServerCommands};
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Endpoint { ip: ip.into(), port }
    }

    fn uri(&self, password: Option<&str>) -> String {
        match password {
            Some(pw) if !pw.is_empty() => format!("redis://:{pw}@{}:{}", self.ip, self.port),
            _ => format!("redis://{}:{}", self.ip, self.port),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// The role a Redis instance currently reports via `ROLE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Master { replication_offset: i64 },
    Replica { master_ip: String, master_port: u16 },
    Sentinel,
}

/// Parsed fields from `INFO` relevant to health/readiness and C2-C10.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedisInfo {
    pub loading: bool,
    pub master_link_status: Option<String>,
    pub master_sync_in_progress: bool,
    pub connected_slaves: i64,
}

impl RedisInfo {
    /// A replica is a valid promotion/reparenting candidate only if it is
    /// not loading, not mid-sync, and its master link (if any) isn't down
    /// (`spec.md` §4.4 "Authoritative primary selection").
    pub fn is_healthy_candidate(&self) -> bool {
        !self.loading
            && !self.master_sync_in_progress
            && self.master_link_status.as_deref() != Some("down")
    }
}

#[async_trait]
pub trait RedisClient: Send + Sync {
    async fn ping(&self, addr: &Endpoint, password: Option<&str>) -> Result<()>;
    async fn role(&self, addr: &Endpoint, password: Option<&str>) -> Result<Role>;
    async fn info(&self, addr: &Endpoint, password: Option<&str>) -> Result<RedisInfo>;
    async fn make_master(&self, addr: &Endpoint, password: Option<&str>) -> Result<()>;
    async fn make_slave_of(
        &self,
        addr: &Endpoint,
        master: &Endpoint,
        password: Option<&str>,
    ) -> Result<()>;
    /// Replays custom config lines via `CONFIG SET`. Per key failures are
    /// returned rather than aborting (`spec.md` §4.4: "best-effort").
    async fn set_custom_config(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        config: &[String],
    ) -> Vec<(String, Error)>;

    /// `CONFIG GET` for each declared key, used by the checker (C8) to
    /// detect drift between the declared custom config and the pod's live
    /// config. Returns `(key, value)` pairs actually present; a key with
    /// no reply is simply absent from the result (treated as drifted by
    /// the caller).
    async fn get_custom_config(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        keys: &[String],
    ) -> Result<Vec<(String, String)>>;
}

pub struct RustisRedisClient;

impl RustisRedisClient {
    pub fn new() -> Self {
        RustisRedisClient
    }

    async fn connect(&self, addr: &Endpoint, password: Option<&str>) -> Result<Client> {
        let uri = addr.uri(password);
        let config = uri.into_config().map_err(|source| Error::Redis {
            addr: addr.to_string(),
            source,
        })?;
        timeout(CONNECT_TIMEOUT, Client::connect(config))
            .await
            .map_err(|_| Error::Redis {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Redis {
                addr: addr.to_string(),
                source,
            })
    }
}

impl Default for RustisRedisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RedisClient for RustisRedisClient {
    async fn ping(&self, addr: &Endpoint, password: Option<&str>) -> Result<()> {
        let client = self.connect(addr, password).await?;
        let _reply: String = timeout(COMMAND_TIMEOUT, client.ping(()))
            .await
            .map_err(|_| Error::Redis {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Redis {
                addr: addr.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn role(&self, addr: &Endpoint, password: Option<&str>) -> Result<Role> {
        let client = self.connect(addr, password).await?;
        let result: RoleResult = timeout(COMMAND_TIMEOUT, client.role())
            .await
            .map_err(|_| Error::Redis {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Redis {
                addr: addr.to_string(),
                source,
            })?;
        Ok(match result {
            RoleResult::Master {
                master_replication_offset,
                ..
            } => Role::Master {
                replication_offset: master_replication_offset as i64,
            },
            RoleResult::Replica {
                master_ip,
                master_port,
                ..
            } => Role::Replica {
                master_ip,
                master_port,
            },
            RoleResult::Sentinel { .. } => Role::Sentinel,
        })
    }

    async fn info(&self, addr: &Endpoint, password: Option<&str>) -> Result<RedisInfo> {
        let client = self.connect(addr, password).await?;
        let raw: String = timeout(COMMAND_TIMEOUT, client.info(vec![InfoSection::Replication, InfoSection::Persistence]))
            .await
            .map_err(|_| Error::Redis {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Redis {
                addr: addr.to_string(),
                source,
            })?;
        Ok(parse_info(&raw))
    }

    async fn make_master(&self, addr: &Endpoint, password: Option<&str>) -> Result<()> {
        let client = self.connect(addr, password).await?;
        timeout(COMMAND_TIMEOUT, client.replicaof(ReplicaOfOptions::no_one()))
            .await
            .map_err(|_| Error::Redis {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Redis {
                addr: addr.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn make_slave_of(
        &self,
        addr: &Endpoint,
        master: &Endpoint,
        password: Option<&str>,
    ) -> Result<()> {
        let client = self.connect(addr, password).await?;
        timeout(
            COMMAND_TIMEOUT,
            client.replicaof(ReplicaOfOptions::master(master.ip.clone(), master.port)),
        )
        .await
        .map_err(|_| Error::Redis {
            addr: addr.to_string(),
            source: rustis::Error::Client("command timed out".to_string()),
        })?
        .map_err(|source| Error::Redis {
            addr: addr.to_string(),
            source,
        })?;
        Ok(())
    }

    async fn set_custom_config(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        config: &[String],
    ) -> Vec<(String, Error)> {
        let client = match self.connect(addr, password).await {
            Ok(client) => client,
            Err(err) => {
                return config
                    .iter()
                    .map(|line| (line.clone(), clone_err(&err)))
                    .collect()
            }
        };

        let mut failures = Vec::new();
        for line in config {
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            let outcome = timeout(
                COMMAND_TIMEOUT,
                client.config_set(vec![(key.to_string(), value.to_string())]),
            )
            .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(source)) => failures.push((
                    line.clone(),
                    Error::Redis {
                        addr: addr.to_string(),
                        source,
                    },
                )),
                Err(_) => failures.push((
                    line.clone(),
                    Error::Redis {
                        addr: addr.to_string(),
                        source: rustis::Error::Client("command timed out".to_string()),
                    },
                )),
            }
        }
        failures
    }

    async fn get_custom_config(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        keys: &[String],
    ) -> Result<Vec<(String, String)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.connect(addr, password).await?;
        let pairs: Vec<(String, String)> = timeout(COMMAND_TIMEOUT, client.config_get(keys.to_vec()))
            .await
            .map_err(|_| Error::Redis {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Redis {
                addr: addr.to_string(),
                source,
            })?;
        Ok(pairs)
    }
}

fn clone_err(err: &Error) -> Error {
    match err {
        Error::Redis { addr, .. } => Error::Redis {
            addr: addr.clone(),
            source: rustis::Error::Client("command timed out".to_string()),
        },
        other => Error::InvariantViolated(other.to_string()),
    }
}

fn parse_info(raw: &str) -> RedisInfo {
    let mut info = RedisInfo::default();
    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key {
            "loading" => info.loading = value == "1",
            "master_link_status" => info.master_link_status = Some(value.to_string()),
            "master_sync_in_progress" => info.master_sync_in_progress = value == "1",
            "connected_slaves" => info.connected_slaves = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    info
}
