//! Defaults for `ValkeyFailover`, grounded in
//! `original_source/api/valkeyfailover/v1/defaults.go`.

pub const DEFAULT_SENTINEL_ENABLED: bool = true;

pub const DEFAULT_VALKEY_NUMBER: i32 = 3;
pub const DEFAULT_SENTINEL_NUMBER: i32 = 3;
pub const DEFAULT_VALKEY_PORT: i32 = 6379;
pub const DEFAULT_IMAGE: &str = "valkey/valkey:7.2.5-alpine";
pub const DEFAULT_EXPORTER_IMAGE: &str = "quay.io/oliver006/redis_exporter:v1.43.0";
pub const DEFAULT_SENTINEL_EXPORTER_IMAGE: &str = "quay.io/oliver006/redis_exporter:v1.43.0";
pub const DEFAULT_FAILOVER_TIMEOUT_SECONDS: u32 = 10;

pub const MAX_NAME_LENGTH: usize = 48;

pub fn default_sentinel_custom_config() -> Vec<String> {
    vec![
        "down-after-milliseconds 5000".to_string(),
        "failover-timeout 10000".to_string(),
    ]
}

pub fn default_valkey_custom_config() -> Vec<String> {
    vec!["replica-priority 100".to_string()]
}

pub fn bootstrapping_valkey_custom_config() -> Vec<String> {
    vec!["replica-priority 0".to_string()]
}

pub use crate::redisfailover::deduplicate;
