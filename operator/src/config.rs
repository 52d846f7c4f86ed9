//! Immutable controller configuration, built once at startup from CLI
//! flags and threaded through as an `Arc` (`spec.md` §9: "Global state").
//!
//! Grounded in `original_source/operator/redisfailover/config.go`.

/// Configuration for the operator's reconciliation engine. Constructed once
/// by `redisfailover-server` from parsed CLI flags and shared (via `Arc`)
/// across every worker.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen_address: String,
    pub metrics_path: String,
    pub concurrency: usize,
    pub sync_interval_secs: u64,
    pub supported_namespaces_regex: String,
    /// Image used for Redis instance-manager init containers. Empty string
    /// disables RDB cleanup, matching the Go flag's documented default.
    pub instance_manager_image: String,
    pub k8s_qps_limit: f32,
    pub k8s_burst_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: ":9710".to_string(),
            metrics_path: "/metrics".to_string(),
            concurrency: 3,
            sync_interval_secs: 30,
            supported_namespaces_regex: ".*".to_string(),
            instance_manager_image: String::new(),
            k8s_qps_limit: 100.0,
            k8s_burst_limit: 100,
        }
    }
}

impl Config {
    pub fn namespace_regex(&self) -> Result<regex::Regex, regex::Error> {
        regex::Regex::new(&self.supported_namespaces_regex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_flag_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.sync_interval_secs, 30);
        assert_eq!(cfg.supported_namespaces_regex, ".*");
        assert!(cfg.namespace_regex().unwrap().is_match("any-namespace"));
    }
}
