//! `rfr-<name>` / `rfs-<name>` configmaps holding the rendered custom
//! config lines (`spec.md` §4.5).

use k8s_openapi::api::core::v1::ConfigMap;
use redisfailover_crd::FailoverResource;
use std::collections::BTreeMap;

use super::{object_meta, REDIS_COMPONENT, SENTINEL_COMPONENT};
use crate::names;

pub const REDIS_CONFIG_KEY: &str = "redis.conf";
pub const SENTINEL_CONFIG_KEY: &str = "sentinel.conf";

pub fn redis_configmap(resource: &dyn FailoverResource, merged_config: &[String]) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(REDIS_CONFIG_KEY.to_string(), merged_config.join("\n"));
    ConfigMap {
        metadata: object_meta(resource, names::redis_configmap_name(resource.name()), REDIS_COMPONENT),
        data: Some(data),
        ..Default::default()
    }
}

pub fn sentinel_configmap(resource: &dyn FailoverResource, merged_config: &[String]) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(SENTINEL_CONFIG_KEY.to_string(), merged_config.join("\n"));
    ConfigMap {
        metadata: object_meta(
            resource,
            names::sentinel_configmap_name(resource.name()),
            SENTINEL_COMPONENT,
        ),
        data: Some(data),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_redis_failover;

    #[test]
    fn configmap_name_follows_prefix_convention() {
        let rf = test_redis_failover("prod", 3, 3);
        let cm = redis_configmap(&rf, &["maxmemory 100mb".to_string()]);
        assert_eq!(cm.metadata.name.as_deref(), Some("rfr-prod"));
        assert_eq!(
            cm.data.unwrap().get(REDIS_CONFIG_KEY).map(String::as_str),
            Some("maxmemory 100mb")
        );
    }
}
