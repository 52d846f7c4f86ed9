//! Derived booleans for `RedisFailover`, grounded in
//! `original_source/api/redisfailover/v1/bootstrapping.go`.

use super::defaults::{DEFAULT_FAILOVER_TIMEOUT_SECONDS, DEFAULT_SENTINEL_ENABLED};
use super::RedisFailover;

impl RedisFailover {
    /// `Bootstrapping = (BootstrapNode ≠ ∅)`.
    pub fn bootstrapping(&self) -> bool {
        self.spec.bootstrap_node.is_some()
    }

    /// `SentinelEnabled = spec.Sentinel.Enabled ?? DefaultSentinelEnabled`.
    pub fn sentinel_enabled(&self) -> bool {
        self.spec.sentinel.enabled.unwrap_or(DEFAULT_SENTINEL_ENABLED)
    }

    /// `SentinelsAllowed = SentinelEnabled ∧ (¬Bootstrapping ∨ BootstrapNode.AllowSentinels)`.
    pub fn sentinels_allowed(&self) -> bool {
        if !self.sentinel_enabled() {
            return false;
        }
        match &self.spec.bootstrap_node {
            None => true,
            Some(node) => node.allow_sentinels,
        }
    }

    /// `OperatorManagedFailover = ¬SentinelEnabled`.
    pub fn operator_managed_failover(&self) -> bool {
        !self.sentinel_enabled()
    }

    /// `Quorum = ⌊S/2⌋ + 1`.
    pub fn quorum(&self) -> i32 {
        quorum_of(self.spec.sentinel.replicas.max(1))
    }

    pub fn failover_timeout_seconds(&self) -> u32 {
        self.spec
            .sentinel
            .failover_timeout_seconds
            .unwrap_or(DEFAULT_FAILOVER_TIMEOUT_SECONDS)
    }
}

pub fn quorum_of(sentinel_replicas: i32) -> i32 {
    sentinel_replicas / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AuthSpec, BootstrapNode, EngineSpec, SentinelSpec};
    use crate::redisfailover::{RedisFailover, RedisFailoverSpec};
    use kube::core::ObjectMeta;
    use rstest::rstest;

    fn make(sentinel_enabled: Option<bool>, bootstrap: Option<BootstrapNode>) -> RedisFailover {
        RedisFailover {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: RedisFailoverSpec {
                redis: EngineSpec::default(),
                sentinel: SentinelSpec {
                    enabled: sentinel_enabled,
                    ..Default::default()
                },
                auth: AuthSpec::default(),
                bootstrap_node: bootstrap,
                instance_manager_image: None,
            },
            status: None,
        }
    }

    #[test]
    fn quorum_matches_formula_for_all_s() {
        for s in 1..=21 {
            assert_eq!(quorum_of(s), s / 2 + 1);
        }
    }

    #[rstest]
    #[case(None, None, true, false, true, false)]
    #[case(Some(false), None, false, false, false, true)]
    #[case(None, Some(false), true, true, false, false)]
    #[case(None, Some(true), true, true, true, false)]
    #[case(Some(false), Some(true), false, true, false, true)]
    fn sentinels_allowed_truth_table(
        #[case] enabled: Option<bool>,
        #[case] allow_sentinels: Option<bool>,
        #[case] expect_sentinel_enabled: bool,
        #[case] expect_bootstrapping: bool,
        #[case] expect_sentinels_allowed: bool,
        #[case] expect_operator_managed: bool,
    ) {
        let bootstrap = allow_sentinels.map(|allow| BootstrapNode {
            host: "10.0.0.9".to_string(),
            port: "6380".to_string(),
            allow_sentinels: allow,
        });
        let rf = make(enabled, bootstrap);
        assert_eq!(rf.sentinel_enabled(), expect_sentinel_enabled);
        assert_eq!(rf.bootstrapping(), expect_bootstrapping);
        assert_eq!(rf.sentinels_allowed(), expect_sentinels_allowed);
        assert_eq!(rf.operator_managed_failover(), expect_operator_managed);
    }
}
