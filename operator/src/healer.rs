//! Issues corrective wire calls in the strict order demanded by `spec.md`
//! §4.4, ported action-for-action from
//! `original_source/operator/redisfailover/service/heal.go`.

use std::collections::BTreeMap;

use crate::checker::Violation;
use crate::error::{Error, Result};
use crate::k8s_client::OrchestratorClient;
use crate::names::REDIS_ROLE_LABEL_KEY;
use crate::redis_client::{Endpoint, RedisClient};
use crate::sentinel_client::SentinelClient;
use crate::topology::{RedisPod, Topology};

pub struct HealTarget<'a> {
    pub namespace: &'a str,
    pub redis_port: u16,
    pub redis_password: Option<&'a str>,
    pub sentinel_password: Option<&'a str>,
    pub master_name: &'a str,
    pub quorum: usize,
    pub operator_managed_failover: bool,
    /// `BootstrapNode`'s endpoint, when bootstrapping. `SetExternalMasterOnAll`
    /// reparents onto this, never onto an internal pod IP.
    pub bootstrap: Option<Endpoint>,
}

/// Deterministic replica selection shared by `PromoteBestReplica` and
/// `SetOldestAsMaster`'s "who goes first" tie-break: greatest replication
/// offset, then oldest creation timestamp, then lexicographic name
/// (`spec.md` §4.4 "Authoritative primary selection").
pub fn select_promotion_candidate<'a>(pods: &'a [RedisPod]) -> Option<&'a RedisPod> {
    pods.iter()
        .filter(|p| !p.should_skip())
        .filter(|p| {
            p.observed
                .as_ref()
                .map(|o| o.info.is_healthy_candidate())
                .unwrap_or(false)
        })
        .max_by(|a, b| {
            let offset_a = a.observed.as_ref().map(|o| o.replication_offset).unwrap_or(0);
            let offset_b = b.observed.as_ref().map(|o| o.replication_offset).unwrap_or(0);
            offset_a
                .cmp(&offset_b)
                .then_with(|| {
                    // Oldest creationTimestamp wins ties: reverse order so max_by picks it.
                    match (&a.creation_timestamp, &b.creation_timestamp) {
                        (Some(ta), Some(tb)) => tb.cmp(ta),
                        (Some(_), None) => std::cmp::Ordering::Greater,
                        (None, Some(_)) => std::cmp::Ordering::Less,
                        (None, None) => std::cmp::Ordering::Equal,
                    }
                })
                .then_with(|| b.name.cmp(&a.name))
        })
}

/// `SetOldestAsMaster`: order pods by creation timestamp, oldest becomes
/// master, every other pod becomes its replica.
pub async fn set_oldest_as_master(
    redis: &dyn RedisClient,
    target: &HealTarget<'_>,
    pods: &[RedisPod],
) -> Result<String> {
    let mut ordered: Vec<&RedisPod> = pods.iter().filter(|p| !p.should_skip()).collect();
    ordered.sort_by(|a, b| match (&a.creation_timestamp, &b.creation_timestamp) {
        (Some(ta), Some(tb)) => ta.cmp(tb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });

    let Some(new_master) = ordered.first() else {
        return Err(Error::NoPromotionCandidate);
    };
    let master_ip = new_master.ip.clone().ok_or(Error::NoPromotionCandidate)?;
    let master_endpoint = Endpoint::new(master_ip.clone(), target.redis_port);
    redis.make_master(&master_endpoint, target.redis_password).await?;

    for pod in ordered.iter().skip(1) {
        let Some(endpoint) = pod.endpoint(target.redis_port) else { continue };
        redis
            .make_slave_of(&endpoint, &master_endpoint, target.redis_password)
            .await?;
    }
    Ok(master_ip)
}

/// `PromoteBestReplica` / `MakeMaster`: promote one candidate, reparent the
/// rest, best-effort (a single replica's reparent failure does not abort
/// the rest — mirrors heal.go's `PromoteBestReplica` continue-on-error loop).
pub async fn promote_best_replica(
    redis: &dyn RedisClient,
    target: &HealTarget<'_>,
    new_master: &RedisPod,
    all_pods: &[RedisPod],
) -> Result<String> {
    let master_ip = new_master.ip.clone().ok_or(Error::NoPromotionCandidate)?;
    let master_endpoint = Endpoint::new(master_ip.clone(), target.redis_port);
    redis.make_master(&master_endpoint, target.redis_password).await?;

    for pod in all_pods {
        if pod.name == new_master.name || pod.should_skip() {
            continue;
        }
        let Some(endpoint) = pod.endpoint(target.redis_port) else { continue };
        let _ = redis
            .make_slave_of(&endpoint, &master_endpoint, target.redis_password)
            .await;
    }
    Ok(master_ip)
}

/// `SetMasterOnAll`: reparent every non-master pod onto `master_ip`,
/// aborting if a concurrent topology change is detected mid-loop
/// (`spec.md` §4.4 action 3: "re-verify the intended master is still
/// master").
pub async fn set_master_on_all(
    redis: &dyn RedisClient,
    target: &HealTarget<'_>,
    master_ip: &str,
    pods: &[RedisPod],
) -> Result<()> {
    let master_endpoint = Endpoint::new(master_ip, target.redis_port);
    for pod in pods {
        if pod.should_skip() || pod.ip.as_deref() == Some(master_ip) {
            continue;
        }
        match redis.role(&master_endpoint, target.redis_password).await {
            Ok(crate::redis_client::Role::Master { .. }) => {}
            _ => {
                return Err(Error::ConcurrentTopologyChange(format!(
                    "{master_ip} no longer reports itself as master"
                )))
            }
        }
        let Some(endpoint) = pod.endpoint(target.redis_port) else { continue };
        redis
            .make_slave_of(&endpoint, &master_endpoint, target.redis_password)
            .await?;
    }
    Ok(())
}

/// `SetExternalMasterOnAll` (bootstrap mode): every Redis pod becomes a
/// replica of the external `BootstrapNode`.
pub async fn set_external_master_on_all(
    redis: &dyn RedisClient,
    target: &HealTarget<'_>,
    bootstrap: &Endpoint,
    pods: &[RedisPod],
) -> Result<()> {
    for pod in pods {
        if pod.should_skip() {
            continue;
        }
        let Some(endpoint) = pod.endpoint(target.redis_port) else { continue };
        redis
            .make_slave_of(&endpoint, bootstrap, target.redis_password)
            .await?;
    }
    Ok(())
}

/// `NewSentinelMonitor`: `SENTINEL MONITOR <name> <ip> <port> <quorum>`.
pub async fn new_sentinel_monitor(
    sentinel: &dyn SentinelClient,
    target: &HealTarget<'_>,
    sentinel_endpoint: &Endpoint,
    master: &Endpoint,
) -> Result<()> {
    sentinel
        .monitor(
            sentinel_endpoint,
            target.sentinel_password,
            target.master_name,
            master,
            target.quorum,
        )
        .await
}

/// `RestoreSentinel`: `SENTINEL RESET *`.
pub async fn restore_sentinel(
    sentinel: &dyn SentinelClient,
    target: &HealTarget<'_>,
    sentinel_endpoint: &Endpoint,
) -> Result<()> {
    sentinel
        .reset(sentinel_endpoint, target.sentinel_password, target.master_name)
        .await
}

/// `SetRedisCustomConfig` / `SetSentinelCustomConfig`: best-effort replay,
/// individual key failures are collected, never abort the cycle.
pub async fn replay_redis_custom_config(
    redis: &dyn RedisClient,
    target: &HealTarget<'_>,
    endpoint: &Endpoint,
    config: &[String],
) -> Vec<(String, Error)> {
    redis
        .set_custom_config(endpoint, target.redis_password, config)
        .await
}

pub async fn replay_sentinel_custom_config(
    sentinel: &dyn SentinelClient,
    target: &HealTarget<'_>,
    endpoint: &Endpoint,
    config: &[String],
) -> Vec<(String, Error)> {
    sentinel
        .set_custom_config(endpoint, target.sentinel_password, target.master_name, config)
        .await
}

/// `StaleLabel`: patch the pod's role label to match observed ROLE.
pub async fn fix_stale_label(
    orchestrator: &dyn OrchestratorClient,
    namespace: &str,
    pod_name: &str,
    expected_label: &'static str,
) -> Result<()> {
    let mut labels = BTreeMap::new();
    labels.insert(REDIS_ROLE_LABEL_KEY.to_string(), expected_label.to_string());
    orchestrator.update_pod_labels(namespace, pod_name, labels).await
}

/// Drives a full heal pass over one reconciliation's violations, in the
/// fixed order from `spec.md` §4.4. Returns early (aborting later actions)
/// only on a `Fatal`/`Precondition`-class error from a topology-changing
/// action; config-drift and label fixes are always best-effort.
pub async fn heal(
    redis: &dyn RedisClient,
    sentinel: &dyn SentinelClient,
    orchestrator: &dyn OrchestratorClient,
    target: &HealTarget<'_>,
    topology: &Topology,
    violations: &[Violation],
    redis_custom_config: &[String],
    sentinel_custom_config: &[String],
) -> Result<()> {
    let has = |f: &dyn Fn(&Violation) -> bool| violations.iter().any(|v| f(v));

    let mut resolved_master_ip: Option<String> = topology
        .masters()
        .first()
        .and_then(|p| p.ip.clone());

    if has(&|v| matches!(v, Violation::NoMaster)) {
        let new_master_ip = if target.operator_managed_failover {
            let candidate = select_promotion_candidate(&topology.redis_pods)
                .ok_or(Error::NoPromotionCandidate)?;
            promote_best_replica(redis, target, candidate, &topology.redis_pods).await?
        } else {
            set_oldest_as_master(redis, target, &topology.redis_pods).await?
        };
        resolved_master_ip = Some(new_master_ip);
    }

    if has(&|v| matches!(v, Violation::MultipleMasters { .. })) {
        let candidate = select_promotion_candidate(&topology.redis_pods)
            .ok_or(Error::NoPromotionCandidate)?;
        let winner_ip = promote_best_replica(redis, target, candidate, &topology.redis_pods).await?;
        resolved_master_ip = Some(winner_ip);
    }

    for violation in violations {
        if let Violation::ReplicaMisparented { ip, .. } = violation {
            if let Some(master_ip) = resolved_master_ip.as_deref() {
                if master_ip == ip {
                    set_master_on_all(redis, target, master_ip, &topology.redis_pods).await?;
                }
            }
        }
    }

    if has(&|v| matches!(v, Violation::NotReplicatingExternal { .. })) {
        if let Some(bootstrap) = target.bootstrap.clone() {
            set_external_master_on_all(redis, target, &bootstrap, &topology.redis_pods).await?;
        }
    }

    if has(&|v| matches!(v, Violation::SentinelWrongTarget | Violation::SentinelDisagree)) {
        if let Some(master_ip) = resolved_master_ip.as_deref() {
            let master_endpoint = Endpoint::new(master_ip, target.redis_port);
            for sentinel_pod in topology.sentinel_pods.iter().filter(|s| !s.should_skip()) {
                if let Some(ip) = &sentinel_pod.ip {
                    let endpoint = Endpoint::new(ip.clone(), target.redis_port);
                    new_sentinel_monitor(sentinel, target, &endpoint, &master_endpoint).await?;
                }
            }
        }
    }

    for violation in violations {
        if let Violation::SentinelStale { sentinel_pod } = violation {
            if let Some(pod) = topology
                .sentinel_pods
                .iter()
                .find(|s| &s.name == sentinel_pod)
            {
                if let Some(ip) = &pod.ip {
                    let endpoint = Endpoint::new(ip.clone(), target.redis_port);
                    restore_sentinel(sentinel, target, &endpoint).await?;
                }
            }
        }
    }

    let redis_pods_by_name = topology.pods_by_name();
    for violation in violations {
        if let Violation::RedisConfigDrift { pod } = violation {
            if let Some(redis_pod) = redis_pods_by_name.get(pod.as_str()) {
                if let Some(endpoint) = redis_pod.endpoint(target.redis_port) {
                    let failures =
                        replay_redis_custom_config(redis, target, &endpoint, redis_custom_config).await;
                    for (line, err) in failures {
                        tracing::warn!(pod = %pod, line = %line, error = %err, "redis custom config replay failed");
                    }
                }
            }
        }
        if let Violation::SentinelConfigDrift { sentinel_pod } = violation {
            if let Some(pod) = topology.sentinel_pods.iter().find(|s| &s.name == sentinel_pod) {
                if let Some(ip) = &pod.ip {
                    let endpoint = Endpoint::new(ip.clone(), target.redis_port);
                    let failures =
                        replay_sentinel_custom_config(sentinel, target, &endpoint, sentinel_custom_config)
                            .await;
                    for (line, err) in failures {
                        tracing::warn!(sentinel_pod = %sentinel_pod, line = %line, error = %err, "sentinel custom config replay failed");
                    }
                }
            }
        }
    }

    for violation in violations {
        if let Violation::StaleLabel { pod, expected_label } = violation {
            fix_stale_label(orchestrator, target.namespace, pod, expected_label).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis_client::{RedisInfo, Role};
    use crate::topology::ObservedPodState;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn pod(name: &str, ip: &str, offset: i64, created_secs: i64, healthy: bool) -> RedisPod {
        let mut info = RedisInfo::default();
        if !healthy {
            info.loading = true;
        }
        RedisPod {
            name: name.to_string(),
            ip: Some(ip.to_string()),
            running: true,
            deletion_timestamp: None,
            role_label: None,
            creation_timestamp: Some(Utc.timestamp_opt(created_secs, 0).unwrap()),
            observed: Some(ObservedPodState {
                role: crate::topology::ObservedRole::Slave,
                master_ip: None,
                master_port: None,
                replication_offset: offset,
                info,
            }),
        }
    }

    #[test]
    fn selects_greatest_offset_first() {
        let pods = vec![pod("r-0", "10.0.0.1", 5, 100, true), pod("r-1", "10.0.0.2", 9, 200, true)];
        let winner = select_promotion_candidate(&pods).unwrap();
        assert_eq!(winner.name, "r-1");
    }

    #[test]
    fn ties_break_on_oldest_creation_timestamp() {
        let pods = vec![pod("r-0", "10.0.0.1", 5, 200, true), pod("r-1", "10.0.0.2", 5, 100, true)];
        let winner = select_promotion_candidate(&pods).unwrap();
        assert_eq!(winner.name, "r-1");
    }

    #[test]
    fn unhealthy_candidates_are_excluded() {
        let pods = vec![pod("r-0", "10.0.0.1", 9, 100, false), pod("r-1", "10.0.0.2", 3, 200, true)];
        let winner = select_promotion_candidate(&pods).unwrap();
        assert_eq!(winner.name, "r-1");
    }

    #[derive(Default)]
    struct RecordingRedis {
        slave_of_calls: Mutex<Vec<(Endpoint, Endpoint)>>,
    }

    #[async_trait]
    impl RedisClient for RecordingRedis {
        async fn ping(&self, _addr: &Endpoint, _password: Option<&str>) -> Result<()> {
            Ok(())
        }
        async fn role(&self, _addr: &Endpoint, _password: Option<&str>) -> Result<Role> {
            Ok(Role::Replica { master_ip: "10.0.0.9".to_string(), master_port: 6379 })
        }
        async fn info(&self, _addr: &Endpoint, _password: Option<&str>) -> Result<RedisInfo> {
            Ok(RedisInfo::default())
        }
        async fn make_master(&self, _addr: &Endpoint, _password: Option<&str>) -> Result<()> {
            Ok(())
        }
        async fn make_slave_of(&self, addr: &Endpoint, master: &Endpoint, _password: Option<&str>) -> Result<()> {
            self.slave_of_calls.lock().unwrap().push((addr.clone(), master.clone()));
            Ok(())
        }
        async fn set_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _config: &[String]) -> Vec<(String, Error)> {
            vec![]
        }
        async fn get_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _keys: &[String]) -> Result<Vec<(String, String)>> {
            Ok(vec![])
        }
    }

    fn bootstrap_target<'a>(bootstrap: Option<Endpoint>) -> HealTarget<'a> {
        HealTarget {
            namespace: "default",
            redis_port: 6379,
            redis_password: None,
            sentinel_password: None,
            master_name: "mymaster",
            quorum: 1,
            operator_managed_failover: false,
            bootstrap,
        }
    }

    struct NoopOrchestrator;

    #[async_trait]
    impl OrchestratorClient for NoopOrchestrator {
        async fn get_configmap(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::core::v1::ConfigMap>> {
            Ok(None)
        }
        async fn create_or_update_configmap(&self, _ns: &str, _object: k8s_openapi::api::core::v1::ConfigMap) -> Result<()> {
            Ok(())
        }
        async fn get_service_account(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::core::v1::ServiceAccount>> {
            Ok(None)
        }
        async fn create_or_update_service_account(&self, _ns: &str, _object: k8s_openapi::api::core::v1::ServiceAccount) -> Result<()> {
            Ok(())
        }
        async fn get_role(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::rbac::v1::Role>> {
            Ok(None)
        }
        async fn create_or_update_role(&self, _ns: &str, _object: k8s_openapi::api::rbac::v1::Role) -> Result<()> {
            Ok(())
        }
        async fn get_role_binding(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::rbac::v1::RoleBinding>> {
            Ok(None)
        }
        async fn create_or_update_role_binding(&self, _ns: &str, _object: k8s_openapi::api::rbac::v1::RoleBinding) -> Result<()> {
            Ok(())
        }
        async fn get_service(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::core::v1::Service>> {
            Ok(None)
        }
        async fn create_or_update_service(&self, _ns: &str, _object: k8s_openapi::api::core::v1::Service) -> Result<()> {
            Ok(())
        }
        async fn delete_service(&self, _ns: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn get_stateful_set(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::apps::v1::StatefulSet>> {
            Ok(None)
        }
        async fn create_or_update_stateful_set(&self, _ns: &str, _object: k8s_openapi::api::apps::v1::StatefulSet) -> Result<()> {
            Ok(())
        }
        async fn get_deployment(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::apps::v1::Deployment>> {
            Ok(None)
        }
        async fn create_or_update_deployment(&self, _ns: &str, _object: k8s_openapi::api::apps::v1::Deployment) -> Result<()> {
            Ok(())
        }
        async fn delete_deployment(&self, _ns: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn get_pod_disruption_budget(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::policy::v1::PodDisruptionBudget>> {
            Ok(None)
        }
        async fn create_or_update_pod_disruption_budget(&self, _ns: &str, _object: k8s_openapi::api::policy::v1::PodDisruptionBudget) -> Result<()> {
            Ok(())
        }
        async fn get_secret(&self, _ns: &str, _name: &str) -> Result<Option<k8s_openapi::api::core::v1::Secret>> {
            Ok(None)
        }
        async fn get_stateful_set_pods(&self, _ns: &str, _name: &str) -> Result<Vec<k8s_openapi::api::core::v1::Pod>> {
            Ok(vec![])
        }
        async fn delete_pod(&self, _ns: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn update_pod_labels(&self, _ns: &str, _name: &str, _labels: BTreeMap<String, String>) -> Result<()> {
            Ok(())
        }
    }

    struct NoopSentinel;

    #[async_trait]
    impl SentinelClient for NoopSentinel {
        async fn monitor(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str, _master: &Endpoint, _quorum: usize) -> Result<()> {
            Ok(())
        }
        async fn reset(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str) -> Result<()> {
            Ok(())
        }
        async fn get_master_addr_by_name(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str) -> Result<Option<Endpoint>> {
            Ok(None)
        }
        async fn set_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str, _config: &[String]) -> Vec<(String, Error)> {
            vec![]
        }
        async fn get_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str, _options: &[String]) -> Result<Vec<(String, String)>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn not_replicating_external_targets_bootstrap_node_not_an_internal_ip() {
        // A converged bootstrap cluster never elects an internal master, so
        // `resolved_master_ip` is `None` here; the heal must still reparent
        // onto `BootstrapNode`, not skip silently.
        let redis = RecordingRedis::default();
        let target = bootstrap_target(Some(Endpoint::new("10.9.9.9", 6380)));
        let pods = vec![pod("r-0", "10.0.0.1", 0, 100, true)];
        let topology = Topology { redis_pods: pods, sentinel_pods: vec![] };
        let violations = vec![Violation::NotReplicatingExternal { pod: "r-0".to_string() }];
        heal(&redis, &NoopSentinel, &NoopOrchestrator, &target, &topology, &violations, &[], &[])
            .await
            .unwrap();

        let calls = redis.slave_of_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Endpoint::new("10.9.9.9", 6380));
    }
}
