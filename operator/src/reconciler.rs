//! Per-object orchestration: Ensure -> Check -> Heal (`spec.md` §2, §4).
//!
//! Kind-agnostic over `RedisFailover`/`ValkeyFailover` through
//! `FailoverResource`; consumes the three capability interfaces
//! (`spec.md` §9) so it never touches a concrete Kubernetes or wire client.
//! Custom-resource status subresource writes are the caller's
//! responsibility (they need a `kube::Api<R>` typed to the concrete kind,
//! which this module deliberately does not depend on) — see
//! `controller::reconcile_key`.

use std::sync::Arc;

use redisfailover_crd::{self as crd, FailoverResource};

use crate::checker::{self, CheckInputs, Violation};
use crate::ensurer::{self, EnsureInputs};
use crate::error::{Error, Result};
use crate::healer::{self, HealTarget};
use crate::k8s_client::OrchestratorClient;
use crate::metrics::Metrics;
use crate::names::{self, COMPONENT_LABEL_KEY, REDIS_COMPONENT, REDIS_ROLE_LABEL_KEY, SENTINEL_COMPONENT};
use crate::redis_client::{Endpoint, RedisClient};
use crate::sentinel_client::SentinelClient;
use crate::topology::{ObservedPodState, RedisPod, SentinelPod, Topology};

pub struct Reconciler {
    pub redis: Arc<dyn RedisClient>,
    pub sentinel: Arc<dyn SentinelClient>,
    pub orchestrator: Arc<dyn OrchestratorClient>,
    pub metrics: Arc<Metrics>,
}

/// Outcome of one Ensure -> Check -> Heal pass, independent of any
/// particular custom-resource kind's status subresource shape.
pub struct ReconcileOutcome {
    pub violations: Vec<Violation>,
    pub healthy: bool,
    pub message: String,
}

impl Reconciler {
    pub async fn reconcile_once(&self, resource: &dyn FailoverResource) -> Result<ReconcileOutcome> {
        let namespace = resource.namespace();
        let redis_port = resource.engine().port.max(1) as u16;
        let password = self.resolve_auth_password(resource).await?;

        let sentinels_allowed = crd::sentinels_allowed(resource);
        let bootstrapping = crd::bootstrapping(resource);
        let operator_managed_failover = crd::operator_managed_failover(resource);
        let quorum = crd::quorum(resource).max(1) as usize;

        ensurer::ensure(
            self.orchestrator.as_ref(),
            resource,
            &EnsureInputs {
                redis_custom_config: &resource.engine().custom_config,
                sentinel_custom_config: &resource.sentinel().custom_config,
                sentinels_allowed,
            },
        )
        .await?;

        let topology = self
            .observe_topology(resource, redis_port, password.as_deref())
            .await?;

        let bootstrap_node = resource.bootstrap_node();
        let bootstrap_ip = bootstrap_node.map(|n| n.host.clone());
        let bootstrap_endpoint = bootstrap_node.map(|n| {
            let port = n.port.parse::<u16>().unwrap_or(redis_port);
            Endpoint::new(n.host.clone(), port)
        });

        let redis_config_drifted = self
            .detect_redis_config_drift(&topology, redis_port, password.as_deref(), &resource.engine().custom_config)
            .await;
        let sentinel_config_drifted = if sentinels_allowed {
            self.detect_sentinel_config_drift(
                &topology,
                redis_port,
                password.as_deref(),
                resource.default_master_name(),
                &resource.sentinel().custom_config,
            )
            .await
        } else {
            Vec::new()
        };

        let inputs = CheckInputs {
            topology: &topology,
            expected_redis_replicas: resource.engine().replicas.max(1),
            actual_redis_replicas: topology.redis_pods.len() as i32,
            sentinels_allowed,
            expected_sentinel_count: resource.sentinel().replicas.max(1),
            bootstrapping,
            bootstrap_ip,
            redis_config_drifted: &redis_config_drifted,
            sentinel_config_drifted: &sentinel_config_drifted,
        };
        let violations = checker::check(&inputs);

        if !violations.is_empty() {
            let target = HealTarget {
                namespace,
                redis_port,
                redis_password: password.as_deref(),
                sentinel_password: password.as_deref(),
                master_name: resource.default_master_name(),
                quorum,
                operator_managed_failover,
                bootstrap: bootstrap_endpoint,
            };
            for violation in &violations {
                self.metrics.record_heal_action(violation_label(violation));
            }
            healer::heal(
                self.redis.as_ref(),
                self.sentinel.as_ref(),
                self.orchestrator.as_ref(),
                &target,
                &topology,
                &violations,
                &resource.engine().custom_config,
                &resource.sentinel().custom_config,
            )
            .await?;
        }

        let healthy = violations.is_empty();
        let message = if healthy {
            String::new()
        } else {
            format!("{} violation(s): {:?}", violations.len(), violations)
        };
        self.metrics.record_reconciliation(
            resource.kind_label(),
            if healthy { "healthy" } else { "not_healthy" },
        );

        Ok(ReconcileOutcome {
            violations,
            healthy,
            message,
        })
    }

    async fn resolve_auth_password(&self, resource: &dyn FailoverResource) -> Result<Option<String>> {
        let auth = resource.auth();
        let (Some(secret_name), Some(secret_key)) = (auth.secret_name.as_deref(), auth.secret_key.as_deref())
        else {
            return Ok(None);
        };
        let secret = self
            .orchestrator
            .get_secret(resource.namespace(), secret_name)
            .await?;
        let Some(secret) = secret else {
            return Err(Error::MissingAuthSecretKey {
                secret: secret_name.to_string(),
                key: secret_key.to_string(),
            });
        };
        let value = secret
            .data
            .as_ref()
            .and_then(|data| data.get(secret_key))
            .ok_or_else(|| Error::MissingAuthSecretKey {
                secret: secret_name.to_string(),
                key: secret_key.to_string(),
            })?;
        Ok(Some(String::from_utf8_lossy(&value.0).into_owned()))
    }

    async fn observe_topology(
        &self,
        resource: &dyn FailoverResource,
        redis_port: u16,
        password: Option<&str>,
    ) -> Result<Topology> {
        let namespace = resource.namespace();
        let pods = self
            .orchestrator
            .get_stateful_set_pods(namespace, resource.name())
            .await?;

        let mut redis_pods = Vec::new();
        let mut sentinel_pods = Vec::new();

        for pod in pods {
            let labels = pod.metadata.labels.clone().unwrap_or_default();
            let component = labels.get(COMPONENT_LABEL_KEY).map(String::as_str);
            let name = pod.metadata.name.clone().unwrap_or_default();
            let ip = pod.status.as_ref().and_then(|s| s.pod_ip.clone());
            let running = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .map(|phase| phase == "Running")
                .unwrap_or(false);
            let deletion_timestamp = pod.metadata.deletion_timestamp.as_ref().map(|t| t.0.to_rfc3339());
            let creation_timestamp = pod
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0.with_timezone(&chrono::Utc));

            match component {
                Some(SENTINEL_COMPONENT) => {
                    let mut sentinel_pod = SentinelPod {
                        name,
                        ip: ip.clone(),
                        running,
                        deletion_timestamp,
                        declared_master: None,
                        known_sentinel_count: None,
                    };
                    if !sentinel_pod.should_skip() {
                        if let Some(ip) = ip {
                            let endpoint = Endpoint::new(ip, redis_port);
                            sentinel_pod.declared_master = self
                                .sentinel
                                .get_master_addr_by_name(&endpoint, password, resource.default_master_name())
                                .await
                                .unwrap_or(None);
                        }
                    }
                    sentinel_pods.push(sentinel_pod);
                }
                _ if component == Some(REDIS_COMPONENT) || component.is_none() => {
                    let mut redis_pod = RedisPod {
                        name,
                        ip: ip.clone(),
                        running,
                        deletion_timestamp,
                        role_label: labels.get(REDIS_ROLE_LABEL_KEY).cloned(),
                        creation_timestamp,
                        observed: None,
                    };
                    if !redis_pod.should_skip() {
                        if let Some(ip) = ip {
                            let endpoint = Endpoint::new(ip, redis_port);
                            if let (Ok(role), Ok(info)) = (
                                self.redis.role(&endpoint, password).await,
                                self.redis.info(&endpoint, password).await,
                            ) {
                                let (observed_role, master_ip, master_port, offset) =
                                    crate::topology::observed_role_from_wire(&role);
                                redis_pod.observed = Some(ObservedPodState {
                                    role: observed_role,
                                    master_ip,
                                    master_port,
                                    replication_offset: offset,
                                    info,
                                });
                            }
                        }
                    }
                    redis_pods.push(redis_pod);
                }
                _ => {}
            }
        }

        Ok(Topology {
            redis_pods,
            sentinel_pods,
        })
    }

    /// C8: compares each reachable Redis pod's live `CONFIG GET` reply for
    /// every declared custom-config key against the declared value.
    /// Pods that are unreachable (`observed == None`) are skipped, same as
    /// the role/label checks — a wire error shouldn't itself be reported
    /// as drift.
    async fn detect_redis_config_drift(
        &self,
        topology: &Topology,
        redis_port: u16,
        password: Option<&str>,
        custom_config: &[String],
    ) -> Vec<String> {
        if custom_config.is_empty() {
            return Vec::new();
        }
        let declared = parse_config_lines(custom_config);
        let keys: Vec<String> = declared.iter().map(|(k, _)| k.clone()).collect();

        let mut drifted = Vec::new();
        for pod in topology.reachable_redis_pods() {
            let Some(ip) = pod.ip.as_deref() else { continue };
            let endpoint = Endpoint::new(ip, redis_port);
            match self.redis.get_custom_config(&endpoint, password, &keys).await {
                Ok(live) => {
                    if config_drifted(&declared, &live) {
                        drifted.push(pod.name.clone());
                    }
                }
                Err(_) => {}
            }
        }
        drifted
    }

    /// C9: same comparison as `detect_redis_config_drift`, against each
    /// reachable Sentinel's `SENTINEL CONFIG GET` reply.
    async fn detect_sentinel_config_drift(
        &self,
        topology: &Topology,
        redis_port: u16,
        password: Option<&str>,
        master_name: &str,
        custom_config: &[String],
    ) -> Vec<String> {
        if custom_config.is_empty() {
            return Vec::new();
        }
        let declared = parse_config_lines(custom_config);
        let keys: Vec<String> = declared.iter().map(|(k, _)| k.clone()).collect();

        let mut drifted = Vec::new();
        for sentinel_pod in &topology.sentinel_pods {
            if sentinel_pod.should_skip() {
                continue;
            }
            let Some(ip) = sentinel_pod.ip.as_deref() else { continue };
            let endpoint = Endpoint::new(ip, redis_port);
            match self
                .sentinel
                .get_custom_config(&endpoint, password, master_name, &keys)
                .await
            {
                Ok(live) => {
                    if config_drifted(&declared, &live) {
                        drifted.push(sentinel_pod.name.clone());
                    }
                }
                Err(_) => {}
            }
        }
        drifted
    }
}

/// Splits `"key value"` config lines into `(key, value)` pairs, mirroring
/// the generators' own parsing of custom config lines.
fn parse_config_lines(lines: &[String]) -> Vec<(String, String)> {
    lines
        .iter()
        .filter_map(|line| line.split_once(' '))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A declared key is drifted if the live config is missing it or reports a
/// different value; unrecognized live keys are ignored.
fn config_drifted(declared: &[(String, String)], live: &[(String, String)]) -> bool {
    declared.iter().any(|(key, value)| {
        live.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v != value)
            .unwrap_or(true)
    })
}

fn violation_label(violation: &Violation) -> &'static str {
    match violation {
        Violation::WrongReplicaCount { .. } => "WrongReplicaCount",
        Violation::NoMaster => "NoMaster",
        Violation::MultipleMasters { .. } => "MultipleMasters",
        Violation::ReplicaMisparented { .. } => "ReplicaMisparented",
        Violation::StaleLabel { .. } => "StaleLabel",
        Violation::SentinelDisagree => "SentinelDisagree",
        Violation::SentinelWrongTarget => "SentinelWrongTarget",
        Violation::SentinelStale { .. } => "SentinelStale",
        Violation::RedisConfigDrift { .. } => "RedisConfigDrift",
        Violation::SentinelConfigDrift { .. } => "SentinelConfigDrift",
        Violation::NotReplicatingExternal { .. } => "NotReplicatingExternal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis_client::{RedisInfo, Role};
    use crate::test_support::test_redis_failover;
    use async_trait::async_trait;
    use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
    use k8s_openapi::api::core::v1::{ConfigMap, Pod, PodStatus, Secret, Service, ServiceAccount};
    use k8s_openapi::api::policy::v1::PodDisruptionBudget;
    use k8s_openapi::api::rbac::v1::{Role as K8sRole, RoleBinding};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap as Map;

    struct FakeOrchestrator {
        pods: Vec<Pod>,
    }

    #[async_trait]
    impl OrchestratorClient for FakeOrchestrator {
        async fn get_configmap(&self, _ns: &str, _name: &str) -> Result<Option<ConfigMap>> {
            Ok(None)
        }
        async fn create_or_update_configmap(&self, _ns: &str, _object: ConfigMap) -> Result<()> {
            Ok(())
        }
        async fn get_service_account(&self, _ns: &str, _name: &str) -> Result<Option<ServiceAccount>> {
            Ok(None)
        }
        async fn create_or_update_service_account(&self, _ns: &str, _object: ServiceAccount) -> Result<()> {
            Ok(())
        }
        async fn get_role(&self, _ns: &str, _name: &str) -> Result<Option<K8sRole>> {
            Ok(None)
        }
        async fn create_or_update_role(&self, _ns: &str, _object: K8sRole) -> Result<()> {
            Ok(())
        }
        async fn get_role_binding(&self, _ns: &str, _name: &str) -> Result<Option<RoleBinding>> {
            Ok(None)
        }
        async fn create_or_update_role_binding(&self, _ns: &str, _object: RoleBinding) -> Result<()> {
            Ok(())
        }
        async fn get_service(&self, _ns: &str, _name: &str) -> Result<Option<Service>> {
            Ok(None)
        }
        async fn create_or_update_service(&self, _ns: &str, _object: Service) -> Result<()> {
            Ok(())
        }
        async fn delete_service(&self, _ns: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn get_stateful_set(&self, _ns: &str, _name: &str) -> Result<Option<StatefulSet>> {
            Ok(None)
        }
        async fn create_or_update_stateful_set(&self, _ns: &str, _object: StatefulSet) -> Result<()> {
            Ok(())
        }
        async fn get_deployment(&self, _ns: &str, _name: &str) -> Result<Option<Deployment>> {
            Ok(None)
        }
        async fn create_or_update_deployment(&self, _ns: &str, _object: Deployment) -> Result<()> {
            Ok(())
        }
        async fn delete_deployment(&self, _ns: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn get_pod_disruption_budget(&self, _ns: &str, _name: &str) -> Result<Option<PodDisruptionBudget>> {
            Ok(None)
        }
        async fn create_or_update_pod_disruption_budget(&self, _ns: &str, _object: PodDisruptionBudget) -> Result<()> {
            Ok(())
        }
        async fn get_secret(&self, _ns: &str, _name: &str) -> Result<Option<Secret>> {
            Ok(None)
        }
        async fn get_stateful_set_pods(&self, _ns: &str, _name: &str) -> Result<Vec<Pod>> {
            Ok(self.pods.clone())
        }
        async fn delete_pod(&self, _ns: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn update_pod_labels(&self, _ns: &str, _name: &str, _labels: Map<String, String>) -> Result<()> {
            Ok(())
        }
    }

    struct FakeRedis;

    #[async_trait]
    impl RedisClient for FakeRedis {
        async fn ping(&self, _addr: &Endpoint, _password: Option<&str>) -> Result<()> {
            Ok(())
        }
        async fn role(&self, addr: &Endpoint, _password: Option<&str>) -> Result<Role> {
            if addr.ip == "10.0.0.1" {
                Ok(Role::Master { replication_offset: 10 })
            } else {
                Ok(Role::Replica {
                    master_ip: "10.0.0.1".to_string(),
                    master_port: 6379,
                })
            }
        }
        async fn info(&self, _addr: &Endpoint, _password: Option<&str>) -> Result<RedisInfo> {
            Ok(RedisInfo::default())
        }
        async fn make_master(&self, _addr: &Endpoint, _password: Option<&str>) -> Result<()> {
            Ok(())
        }
        async fn make_slave_of(&self, _addr: &Endpoint, _master: &Endpoint, _password: Option<&str>) -> Result<()> {
            Ok(())
        }
        async fn set_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _config: &[String]) -> Vec<(String, Error)> {
            vec![]
        }
        async fn get_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _keys: &[String]) -> Result<Vec<(String, String)>> {
            Ok(vec![])
        }
    }

    struct FakeSentinel;

    #[async_trait]
    impl SentinelClient for FakeSentinel {
        async fn monitor(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str, _master: &Endpoint, _quorum: usize) -> Result<()> {
            Ok(())
        }
        async fn reset(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str) -> Result<()> {
            Ok(())
        }
        async fn get_master_addr_by_name(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str) -> Result<Option<Endpoint>> {
            Ok(Some(Endpoint::new("10.0.0.1", 6379)))
        }
        async fn set_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str, _config: &[String]) -> Vec<(String, Error)> {
            vec![]
        }
        async fn get_custom_config(&self, _addr: &Endpoint, _password: Option<&str>, _master_name: &str, _options: &[String]) -> Result<Vec<(String, String)>> {
            Ok(vec![])
        }
    }

    fn running_pod(name: &str, ip: &str, component: &str) -> Pod {
        let mut labels = Map::new();
        labels.insert(COMPONENT_LABEL_KEY.to_string(), component.to_string());
        labels.insert(REDIS_ROLE_LABEL_KEY.to_string(), if ip == "10.0.0.1" {
            names::REDIS_ROLE_LABEL_MASTER.to_string()
        } else {
            names::REDIS_ROLE_LABEL_SLAVE.to_string()
        });
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                pod_ip: Some(ip.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn config_drifted_detects_missing_and_mismatched_keys() {
        let declared = parse_config_lines(&["maxmemory 100mb".to_string(), "appendonly yes".to_string()]);
        let matching = vec![
            ("maxmemory".to_string(), "100mb".to_string()),
            ("appendonly".to_string(), "yes".to_string()),
        ];
        assert!(!config_drifted(&declared, &matching));

        let stale = vec![("maxmemory".to_string(), "0".to_string())];
        assert!(config_drifted(&declared, &stale));

        let missing: Vec<(String, String)> = vec![];
        assert!(config_drifted(&declared, &missing));
    }

    #[tokio::test]
    async fn healthy_cluster_produces_no_violations() {
        let rf = test_redis_failover("prod", 2, 0);
        let orchestrator = Arc::new(FakeOrchestrator {
            pods: vec![
                running_pod("rfr-prod-0", "10.0.0.1", REDIS_COMPONENT),
                running_pod("rfr-prod-1", "10.0.0.2", REDIS_COMPONENT),
            ],
        });
        let reconciler = Reconciler {
            redis: Arc::new(FakeRedis),
            sentinel: Arc::new(FakeSentinel),
            orchestrator,
            metrics: Arc::new(Metrics::new()),
        };
        let outcome = reconciler.reconcile_once(&rf).await.unwrap();
        assert!(outcome.healthy, "{:?}", outcome.violations);
    }
}
