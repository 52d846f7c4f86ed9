//! Owned-object naming conventions. Stable and observable by users
//! (`spec.md` §6: "this contract is observable by users and must not change").

pub fn redis_name(failover_name: &str) -> String {
    format!("rfr-{failover_name}")
}

pub fn sentinel_name(failover_name: &str) -> String {
    format!("rfs-{failover_name}")
}

pub fn redis_configmap_name(failover_name: &str) -> String {
    redis_name(failover_name)
}

pub fn sentinel_configmap_name(failover_name: &str) -> String {
    sentinel_name(failover_name)
}

pub fn redis_readonly_service_name(failover_name: &str) -> String {
    redis_name(failover_name)
}

pub fn redis_master_service_name(failover_name: &str) -> String {
    format!("{}-master", redis_name(failover_name))
}

pub fn sentinel_service_name(failover_name: &str) -> String {
    sentinel_name(failover_name)
}

pub fn service_account_name(failover_name: &str) -> String {
    redis_name(failover_name)
}

pub const REDIS_ROLE_LABEL_KEY: &str = "redisfailover.redisoperator.io/role";
pub const REDIS_ROLE_LABEL_MASTER: &str = "master";
pub const REDIS_ROLE_LABEL_SLAVE: &str = "slave";
pub const FAILOVER_NAME_LABEL_KEY: &str = "redisfailover.redisoperator.io/name";

/// Distinguishes the two managed workloads' pods once both are returned by
/// a single owner-label pod list (`OrchestratorClient::get_stateful_set_pods`).
pub const COMPONENT_LABEL_KEY: &str = "redisfailover.redisoperator.io/component";
pub const REDIS_COMPONENT: &str = "redis";
pub const SENTINEL_COMPONENT: &str = "sentinel";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_stable() {
        assert_eq!(redis_name("prod"), "rfr-prod");
        assert_eq!(sentinel_name("prod"), "rfs-prod");
        assert_eq!(redis_master_service_name("prod"), "rfr-prod-master");
    }
}
