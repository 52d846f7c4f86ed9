//! Observed replication topology: rebuilt every reconciliation from wire
//! calls, never persisted (`spec.md` §3 "Observed topology").

use std::collections::BTreeMap;

use crate::redis_client::{Endpoint, RedisInfo, Role};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservedRole {
    Master,
    Slave,
}

/// A single managed Redis pod as seen this reconciliation.
#[derive(Clone, Debug)]
pub struct RedisPod {
    pub name: String,
    pub ip: Option<String>,
    pub running: bool,
    pub deletion_timestamp: Option<String>,
    pub role_label: Option<String>,
    pub creation_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    /// `None` means the pod was skipped (no IP / not running / deleting) or
    /// was unreachable over the wire this cycle.
    pub observed: Option<ObservedPodState>,
}

#[derive(Clone, Debug)]
pub struct ObservedPodState {
    pub role: ObservedRole,
    pub master_ip: Option<String>,
    pub master_port: Option<u16>,
    pub replication_offset: i64,
    pub info: RedisInfo,
}

impl RedisPod {
    /// Pods without an IP, not `Running`, or marked for deletion are
    /// skipped entirely rather than counted as violations (`spec.md` §4.3).
    pub fn should_skip(&self) -> bool {
        self.ip.is_none() || !self.running || self.deletion_timestamp.is_some()
    }

    pub fn endpoint(&self, port: u16) -> Option<Endpoint> {
        self.ip.as_deref().map(|ip| Endpoint::new(ip, port))
    }

    pub fn is_unreachable(&self) -> bool {
        !self.should_skip() && self.observed.is_none()
    }

    pub fn is_master(&self) -> bool {
        matches!(
            self.observed.as_ref().map(|o| &o.role),
            Some(ObservedRole::Master)
        )
    }
}

pub fn observed_role_from_wire(role: &Role) -> (ObservedRole, Option<String>, Option<u16>, i64) {
    match role {
        Role::Master { replication_offset } => (ObservedRole::Master, None, None, *replication_offset),
        Role::Replica {
            master_ip,
            master_port,
            ..
        } => (
            ObservedRole::Slave,
            Some(master_ip.clone()),
            Some(*master_port),
            0,
        ),
        Role::Sentinel => (ObservedRole::Slave, None, None, 0),
    }
}

/// A single Sentinel pod's opinion of the current primary, keyed by its own
/// pod name for error attribution.
#[derive(Clone, Debug)]
pub struct SentinelPod {
    pub name: String,
    pub ip: Option<String>,
    pub running: bool,
    pub deletion_timestamp: Option<String>,
    /// `None` means unreachable this cycle; skipped from C5 agreement
    /// (`spec.md` §9 Open Questions: "skips that Sentinel for C5").
    pub declared_master: Option<Endpoint>,
    pub known_sentinel_count: Option<i32>,
}

impl SentinelPod {
    pub fn should_skip(&self) -> bool {
        self.ip.is_none() || !self.running || self.deletion_timestamp.is_some()
    }
}

/// Full topology snapshot for one reconciliation.
pub struct Topology {
    pub redis_pods: Vec<RedisPod>,
    pub sentinel_pods: Vec<SentinelPod>,
}

impl Topology {
    pub fn reachable_redis_pods(&self) -> impl Iterator<Item = &RedisPod> {
        self.redis_pods.iter().filter(|p| !p.should_skip())
    }

    pub fn masters(&self) -> Vec<&RedisPod> {
        self.reachable_redis_pods().filter(|p| p.is_master()).collect()
    }

    /// A unique accepted primary exists iff all (reachable) Sentinels agree
    /// *and* the named IP currently reports itself master (`spec.md` §3).
    pub fn accepted_primary(&self) -> Option<Endpoint> {
        let reachable: Vec<&Endpoint> = self
            .sentinel_pods
            .iter()
            .filter(|s| !s.should_skip())
            .filter_map(|s| s.declared_master.as_ref())
            .collect();
        if reachable.is_empty() {
            return None;
        }
        let first = reachable[0];
        if !reachable.iter().all(|addr| *addr == first) {
            return None;
        }
        let masters = self.masters();
        let confirmed = masters
            .iter()
            .any(|pod| pod.ip.as_deref() == Some(first.ip.as_str()));
        confirmed.then(|| first.clone())
    }

    pub fn pods_by_name(&self) -> BTreeMap<&str, &RedisPod> {
        self.redis_pods.iter().map(|p| (p.name.as_str(), p)).collect()
    }
}
