//! Defaults for `RedisFailover`, grounded in
//! `original_source/api/redisfailover/v1/defaults.go`.

/// The historical default for sentinel-enablement has flipped across
/// versions of the Go original (`true` in one release, `false` in a
/// subsequent major — `spec.md` §9 Open Question). This implementation
/// pins it to the value carried by the retained Go source at distillation
/// time; see DESIGN.md for the record of that choice.
pub const DEFAULT_SENTINEL_ENABLED: bool = true;

pub const DEFAULT_REDIS_NUMBER: i32 = 3;
pub const DEFAULT_SENTINEL_NUMBER: i32 = 3;
pub const DEFAULT_REDIS_PORT: i32 = 6379;
pub const DEFAULT_IMAGE: &str = "redis:7.2.12-alpine";
pub const DEFAULT_EXPORTER_IMAGE: &str = "quay.io/oliver006/redis_exporter:v1.80.0-alpine";
pub const DEFAULT_SENTINEL_EXPORTER_IMAGE: &str =
    "quay.io/oliver006/redis_exporter:v1.80.0-alpine";
pub const DEFAULT_FAILOVER_TIMEOUT_SECONDS: u32 = 10;

pub const MAX_NAME_LENGTH: usize = 48;

pub fn default_sentinel_custom_config() -> Vec<String> {
    vec![
        "down-after-milliseconds 5000".to_string(),
        "failover-timeout 10000".to_string(),
    ]
}

pub fn default_redis_custom_config() -> Vec<String> {
    vec!["replica-priority 100".to_string()]
}

pub fn bootstrapping_redis_custom_config() -> Vec<String> {
    vec!["replica-priority 0".to_string()]
}

/// Deduplicates a string slice preserving the first occurrence of each
/// entry (`spec.md` P3: `dedup(defaults ++ user) = dedup(defaults ++ user ++ user)`).
pub fn deduplicate(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}
