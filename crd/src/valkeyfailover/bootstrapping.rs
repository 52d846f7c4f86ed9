//! Derived booleans for `ValkeyFailover`, grounded in
//! `original_source/api/valkeyfailover/v1/bootstrapping.go`.

use super::defaults::{DEFAULT_FAILOVER_TIMEOUT_SECONDS, DEFAULT_SENTINEL_ENABLED};
use super::ValkeyFailover;
use crate::redisfailover::quorum_of;

impl ValkeyFailover {
    pub fn bootstrapping(&self) -> bool {
        self.spec.bootstrap_node.is_some()
    }

    pub fn sentinel_enabled(&self) -> bool {
        self.spec.sentinel.enabled.unwrap_or(DEFAULT_SENTINEL_ENABLED)
    }

    pub fn sentinels_allowed(&self) -> bool {
        if !self.sentinel_enabled() {
            return false;
        }
        match &self.spec.bootstrap_node {
            None => true,
            Some(node) => node.allow_sentinels,
        }
    }

    pub fn operator_managed_failover(&self) -> bool {
        !self.sentinel_enabled()
    }

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
