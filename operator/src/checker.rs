//! Pure observation over a `Topology`: returns violations, never mutates
//! anything (`spec.md` §4.3).

use crate::topology::{ObservedRole, Topology};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// C1. Reported, not healed by this module (`spec.md` §4.4 notes the
    /// stateful-set replica count is reconciled by the ensurer, not the
    /// healer).
    WrongReplicaCount { expected: i32, actual: i32 },
    NoMaster,
    MultipleMasters { ips: Vec<String> },
    ReplicaMisparented { pod: String, ip: String },
    StaleLabel { pod: String, expected_label: &'static str },
    SentinelDisagree,
    SentinelWrongTarget,
    SentinelStale { sentinel_pod: String },
    RedisConfigDrift { pod: String },
    SentinelConfigDrift { sentinel_pod: String },
    NotReplicatingExternal { pod: String },
}

pub struct CheckInputs<'a> {
    pub topology: &'a Topology,
    pub expected_redis_replicas: i32,
    pub actual_redis_replicas: i32,
    pub sentinels_allowed: bool,
    pub expected_sentinel_count: i32,
    pub bootstrapping: bool,
    pub bootstrap_ip: Option<String>,
    pub redis_config_drifted: &'a [String],
    pub sentinel_config_drifted: &'a [String],
}

pub const REDIS_ROLE_LABEL_MASTER: &str = crate::names::REDIS_ROLE_LABEL_MASTER;
pub const REDIS_ROLE_LABEL_SLAVE: &str = crate::names::REDIS_ROLE_LABEL_SLAVE;

/// Runs checks C1-C10 in order; a violation never short-circuits the rest.
pub fn check(inputs: &CheckInputs) -> Vec<Violation> {
    let mut violations = Vec::new();
    let topology = inputs.topology;

    // C1
    if inputs.actual_redis_replicas != inputs.expected_redis_replicas {
        violations.push(Violation::WrongReplicaCount {
            expected: inputs.expected_redis_replicas,
            actual: inputs.actual_redis_replicas,
        });
    }

    // C2 (skipped while bootstrapping: every pod is a replica of
    // `BootstrapNode` by design, so "no internal master" isn't a fault —
    // C10 is the bootstrap-mode equivalent check).
    let master_ip = if inputs.bootstrapping {
        None
    } else {
        let masters = topology.masters();
        match masters.len() {
            0 => violations.push(Violation::NoMaster),
            1 => {}
            _ => violations.push(Violation::MultipleMasters {
                ips: masters.iter().filter_map(|p| p.ip.clone()).collect(),
            }),
        }
        masters.first().and_then(|p| p.ip.clone())
    };

    // C3 + C4 (skip while bootstrapping; C10 covers that case instead)
    if !inputs.bootstrapping {
        if let Some(master_ip) = master_ip.as_deref() {
            for pod in topology.reachable_redis_pods() {
                if pod.is_master() {
                    continue;
                }
                let Some(observed) = &pod.observed else { continue };
                if observed.master_ip.as_deref() != Some(master_ip) {
                    violations.push(Violation::ReplicaMisparented {
                        pod: pod.name.clone(),
                        ip: master_ip.to_string(),
                    });
                }
            }
        }

        for pod in topology.reachable_redis_pods() {
            // A pod we couldn't reach over the wire this cycle has no
            // observed role to compare the label against; that's a wire
            // error, not label drift.
            if pod.is_unreachable() {
                continue;
            }
            let expected_label = if pod.is_master() {
                REDIS_ROLE_LABEL_MASTER
            } else {
                REDIS_ROLE_LABEL_SLAVE
            };
            if pod.role_label.as_deref() != Some(expected_label) {
                violations.push(Violation::StaleLabel {
                    pod: pod.name.clone(),
                    expected_label,
                });
            }
        }
    }

    // C5-C7
    if inputs.sentinels_allowed {
        let reachable_sentinels: Vec<_> = topology
            .sentinel_pods
            .iter()
            .filter(|s| !s.should_skip())
            .collect();

        let declared: Vec<_> = reachable_sentinels
            .iter()
            .filter_map(|s| s.declared_master.as_ref())
            .collect();
        let agree = !declared.is_empty() && declared.windows(2).all(|w| w[0] == w[1]);
        if !declared.is_empty() && !agree {
            violations.push(Violation::SentinelDisagree);
        }

        // C6: a unique accepted primary (`spec.md` §3: all sentinels agree
        // *and* that address currently reports itself master) must exist
        // whenever the sentinels agree on one; its absence is what the
        // pods are declaring the wrong target.
        if agree && master_ip.is_some() && topology.accepted_primary().is_none() {
            violations.push(Violation::SentinelWrongTarget);
        }

        // C7
        for sentinel in &reachable_sentinels {
            if let Some(count) = sentinel.known_sentinel_count {
                if count != inputs.expected_sentinel_count {
                    violations.push(Violation::SentinelStale {
                        sentinel_pod: sentinel.name.clone(),
                    });
                }
            }
        }
    }

    // C8
    for pod_name in inputs.redis_config_drifted {
        violations.push(Violation::RedisConfigDrift { pod: pod_name.clone() });
    }

    // C9
    for sentinel_name in inputs.sentinel_config_drifted {
        violations.push(Violation::SentinelConfigDrift {
            sentinel_pod: sentinel_name.clone(),
        });
    }

    // C10
    if inputs.bootstrapping {
        if let Some(bootstrap_ip) = inputs.bootstrap_ip.as_deref() {
            for pod in topology.reachable_redis_pods() {
                let points_at_bootstrap = pod
                    .observed
                    .as_ref()
                    .map(|o| {
                        o.role == ObservedRole::Slave && o.master_ip.as_deref() == Some(bootstrap_ip)
                    })
                    .unwrap_or(false);
                if !points_at_bootstrap {
                    violations.push(Violation::NotReplicatingExternal { pod: pod.name.clone() });
                }
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis_client::RedisInfo;
    use crate::topology::{ObservedPodState, RedisPod, SentinelPod};

    fn healthy_master(name: &str, ip: &str) -> RedisPod {
        RedisPod {
            name: name.to_string(),
            ip: Some(ip.to_string()),
            running: true,
            deletion_timestamp: None,
            role_label: Some(REDIS_ROLE_LABEL_MASTER.to_string()),
            creation_timestamp: None,
            observed: Some(ObservedPodState {
                role: ObservedRole::Master,
                master_ip: None,
                master_port: None,
                replication_offset: 10,
                info: RedisInfo::default(),
            }),
        }
    }

    fn healthy_replica(name: &str, ip: &str, master_ip: &str, label_ok: bool) -> RedisPod {
        RedisPod {
            name: name.to_string(),
            ip: Some(ip.to_string()),
            running: true,
            deletion_timestamp: None,
            role_label: Some(if label_ok {
                REDIS_ROLE_LABEL_SLAVE.to_string()
            } else {
                REDIS_ROLE_LABEL_MASTER.to_string()
            }),
            creation_timestamp: None,
            observed: Some(ObservedPodState {
                role: ObservedRole::Slave,
                master_ip: Some(master_ip.to_string()),
                master_port: Some(6379),
                replication_offset: 5,
                info: RedisInfo::default(),
            }),
        }
    }

    #[test]
    fn happy_path_produces_no_violations() {
        let topology = Topology {
            redis_pods: vec![
                healthy_master("r-0", "10.0.0.1"),
                healthy_replica("r-1", "10.0.0.2", "10.0.0.1", true),
            ],
            sentinel_pods: vec![SentinelPod {
                name: "s-0".to_string(),
                ip: Some("10.0.1.1".to_string()),
                running: true,
                deletion_timestamp: None,
                declared_master: Some(crate::redis_client::Endpoint::new("10.0.0.1", 6379)),
                known_sentinel_count: Some(3),
            }],
        };
        let inputs = CheckInputs {
            topology: &topology,
            expected_redis_replicas: 2,
            actual_redis_replicas: 2,
            sentinels_allowed: true,
            expected_sentinel_count: 3,
            bootstrapping: false,
            bootstrap_ip: None,
            redis_config_drifted: &[],
            sentinel_config_drifted: &[],
        };
        assert!(check(&inputs).is_empty());
    }

    #[test]
    fn no_master_is_flagged() {
        let topology = Topology {
            redis_pods: vec![healthy_replica("r-0", "10.0.0.2", "10.0.0.1", true)],
            sentinel_pods: vec![],
        };
        let inputs = CheckInputs {
            topology: &topology,
            expected_redis_replicas: 1,
            actual_redis_replicas: 1,
            sentinels_allowed: false,
            expected_sentinel_count: 0,
            bootstrapping: false,
            bootstrap_ip: None,
            redis_config_drifted: &[],
            sentinel_config_drifted: &[],
        };
        let violations = check(&inputs);
        assert!(violations.contains(&Violation::NoMaster));
    }

    #[test]
    fn misparented_replica_and_stale_label_detected() {
        let topology = Topology {
            redis_pods: vec![
                healthy_master("r-0", "10.0.0.1"),
                healthy_replica("r-1", "10.0.0.2", "10.0.0.9", false),
            ],
            sentinel_pods: vec![],
        };
        let inputs = CheckInputs {
            topology: &topology,
            expected_redis_replicas: 2,
            actual_redis_replicas: 2,
            sentinels_allowed: false,
            expected_sentinel_count: 0,
            bootstrapping: false,
            bootstrap_ip: None,
            redis_config_drifted: &[],
            sentinel_config_drifted: &[],
        };
        let violations = check(&inputs);
        assert!(violations.contains(&Violation::ReplicaMisparented {
            pod: "r-1".to_string(),
            ip: "10.0.0.1".to_string(),
        }));
        assert!(violations.contains(&Violation::StaleLabel {
            pod: "r-1".to_string(),
            expected_label: REDIS_ROLE_LABEL_SLAVE,
        }));
    }

    #[test]
    fn sentinel_agreeing_on_wrong_address_is_flagged() {
        let topology = Topology {
            redis_pods: vec![
                healthy_master("r-0", "10.0.0.1"),
                healthy_replica("r-1", "10.0.0.2", "10.0.0.1", true),
            ],
            sentinel_pods: vec![SentinelPod {
                name: "s-0".to_string(),
                ip: Some("10.0.1.1".to_string()),
                running: true,
                deletion_timestamp: None,
                declared_master: Some(crate::redis_client::Endpoint::new("10.0.0.2", 6379)),
                known_sentinel_count: Some(1),
            }],
        };
        let inputs = CheckInputs {
            topology: &topology,
            expected_redis_replicas: 2,
            actual_redis_replicas: 2,
            sentinels_allowed: true,
            expected_sentinel_count: 1,
            bootstrapping: false,
            bootstrap_ip: None,
            redis_config_drifted: &[],
            sentinel_config_drifted: &[],
        };
        let violations = check(&inputs);
        assert!(violations.contains(&Violation::SentinelWrongTarget));
        assert!(!violations.contains(&Violation::SentinelDisagree));
    }

    #[test]
    fn bootstrapping_does_not_flag_no_master() {
        // Every managed pod replicates the external bootstrap node, so
        // there's never an internal master (`spec.md` I6); C2 must not
        // fire `NoMaster` in this mode.
        let topology = Topology {
            redis_pods: vec![healthy_replica("r-0", "10.0.0.1", "10.0.0.9", true)],
            sentinel_pods: vec![],
        };
        let inputs = CheckInputs {
            topology: &topology,
            expected_redis_replicas: 1,
            actual_redis_replicas: 1,
            sentinels_allowed: false,
            expected_sentinel_count: 0,
            bootstrapping: true,
            bootstrap_ip: Some("10.0.0.9".to_string()),
            redis_config_drifted: &[],
            sentinel_config_drifted: &[],
        };
        let violations = check(&inputs);
        assert!(!violations.contains(&Violation::NoMaster));
        assert!(violations.iter().all(|v| !matches!(v, Violation::MultipleMasters { .. })));
        assert!(violations.iter().all(|v| !matches!(v, Violation::NotReplicatingExternal { .. })));
    }
}
