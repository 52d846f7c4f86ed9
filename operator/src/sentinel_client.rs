//! Sentinel wire-protocol capability interface.
//!
//! Mirrors `redis_client.rs`: a trait seam over the handful of `SENTINEL`
//! subcommands the healer needs, backed by `rustis`. Grounded in
//! `original_source/operator/redisfailover/service/heal.go`'s
//! `NewSentinelMonitor`/`RestoreSentinel`/`SetSentinelCustomConfig`.

use async_trait::async_trait;
use rustis::client::{Client, IntoConfig};
use rustis::commands::SentinelCommands;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::redis_client::Endpoint;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

#[async_trait]
pub trait SentinelClient: Send + Sync {
    /// `SENTINEL MONITOR name ip port quorum`, idempotent: callers reset
    /// first when the monitored master address has changed.
    async fn monitor(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        master_name: &str,
        master: &Endpoint,
        quorum: usize,
    ) -> Result<()>;

    /// `SENTINEL RESET pattern`, used to drop stale monitor state before
    /// re-monitoring under a changed topology.
    async fn reset(&self, addr: &Endpoint, password: Option<&str>, master_name: &str) -> Result<()>;

    /// `SENTINEL GET-MASTER-ADDR-BY-NAME name`. `None` means this sentinel
    /// does not know the master (not yet monitoring, or name mismatch).
    async fn get_master_addr_by_name(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        master_name: &str,
    ) -> Result<Option<Endpoint>>;

    /// `SENTINEL SET name option value ...`, replayed best-effort
    /// (`spec.md` §4.4: "best-effort, do not abort the heal cycle").
    async fn set_custom_config(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        master_name: &str,
        config: &[String],
    ) -> Vec<(String, Error)>;

    /// `SENTINEL CONFIG GET option`, used by the checker (C9) to detect
    /// drift between the declared Sentinel custom config and the
    /// Sentinel's live config.
    async fn get_custom_config(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        master_name: &str,
        options: &[String],
    ) -> Result<Vec<(String, String)>>;
}

pub struct RustisSentinelClient;

impl RustisSentinelClient {
    pub fn new() -> Self {
        RustisSentinelClient
    }

    async fn connect(&self, addr: &Endpoint, password: Option<&str>) -> Result<Client> {
        let uri = match password {
            Some(pw) if !pw.is_empty() => format!("redis://:{pw}@{}:{}", addr.ip, addr.port),
            _ => format!("redis://{}:{}", addr.ip, addr.port),
        };
        let config = uri.into_config().map_err(|source| Error::Sentinel {
            addr: addr.to_string(),
            source,
        })?;
        timeout(CONNECT_TIMEOUT, Client::connect(config))
            .await
            .map_err(|_| Error::Sentinel {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Sentinel {
                addr: addr.to_string(),
                source,
            })
    }
}

impl Default for RustisSentinelClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentinelClient for RustisSentinelClient {
    async fn monitor(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        master_name: &str,
        master: &Endpoint,
        quorum: usize,
    ) -> Result<()> {
        let client = self.connect(addr, password).await?;
        timeout(
            COMMAND_TIMEOUT,
            client.sentinel_monitor(master_name, master.ip.clone(), master.port, quorum),
        )
        .await
        .map_err(|_| Error::Sentinel {
            addr: addr.to_string(),
            source: rustis::Error::Client("command timed out".to_string()),
        })?
        .map_err(|source| Error::Sentinel {
            addr: addr.to_string(),
            source,
        })?;
        Ok(())
    }

    async fn reset(&self, addr: &Endpoint, password: Option<&str>, master_name: &str) -> Result<()> {
        let client = self.connect(addr, password).await?;
        timeout(COMMAND_TIMEOUT, client.sentinel_reset(master_name.to_string()))
            .await
            .map_err(|_| Error::Sentinel {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Sentinel {
                addr: addr.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn get_master_addr_by_name(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        master_name: &str,
    ) -> Result<Option<Endpoint>> {
        let client = self.connect(addr, password).await?;
        let result: Option<(String, u16)> = timeout(
            COMMAND_TIMEOUT,
            client.sentinel_get_master_addr_by_name(master_name.to_string()),
        )
        .await
        .map_err(|_| Error::Sentinel {
            addr: addr.to_string(),
            source: rustis::Error::Client("command timed out".to_string()),
        })?
        .map_err(|source| Error::Sentinel {
            addr: addr.to_string(),
            source,
        })?;
        Ok(result.map(|(ip, port)| Endpoint::new(ip, port)))
    }

    async fn set_custom_config(
        &self,
        addr: &Endpoint,
        password: Option<&str>,
        master_name: &str,
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
            let Some((option, value)) = line.split_once(' ') else {
                continue;
            };
            let outcome = timeout(
                COMMAND_TIMEOUT,
                client.sentinel_set(
                    master_name.to_string(),
                    vec![(option.to_string(), value.to_string())],
                ),
            )
            .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(source)) => failures.push((
                    line.clone(),
                    Error::Sentinel {
                        addr: addr.to_string(),
                        source,
                    },
                )),
                Err(_) => failures.push((
                    line.clone(),
                    Error::Sentinel {
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
        _master_name: &str,
        options: &[String],
    ) -> Result<Vec<(String, String)>> {
        if options.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.connect(addr, password).await?;
        let mut found = Vec::new();
        for option in options {
            let pairs: std::collections::HashMap<String, String> = timeout(
                COMMAND_TIMEOUT,
                client.sentinel_config_get(option.clone()),
            )
            .await
            .map_err(|_| Error::Sentinel {
                addr: addr.to_string(),
                source: rustis::Error::Client("command timed out".to_string()),
            })?
            .map_err(|source| Error::Sentinel {
                addr: addr.to_string(),
                source,
            })?;
            found.extend(pairs);
        }
        Ok(found)
    }
}

fn clone_err(err: &Error) -> Error {
    match err {
        Error::Sentinel { addr, .. } => Error::Sentinel {
            addr: addr.clone(),
            source: rustis::Error::Client("command timed out".to_string()),
        },
        other => Error::InvariantViolated(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_round_trips_through_get_master_addr_result() {
        let result: Option<(String, u16)> = Some(("10.0.0.5".to_string(), 6379));
        let endpoint = result.map(|(ip, port)| Endpoint::new(ip, port));
        assert_eq!(endpoint, Some(Endpoint::new("10.0.0.5", 6379)));
    }
}
