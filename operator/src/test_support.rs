//! Shared fixtures for unit tests across this crate's modules.

#![cfg(test)]

use kube::core::ObjectMeta;
use redisfailover_crd::common::{AuthSpec, EngineSpec, SentinelSpec};
use redisfailover_crd::redisfailover::{RedisFailover, RedisFailoverSpec};

pub fn test_redis_failover(name: &str, redis_replicas: i32, sentinel_replicas: i32) -> RedisFailover {
    RedisFailover {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some("test-uid".to_string()),
            ..Default::default()
        },
        spec: RedisFailoverSpec {
            redis: EngineSpec {
                image: "redis:7.2.12-alpine".to_string(),
                replicas: redis_replicas,
                port: 6379,
                ..Default::default()
            },
            sentinel: SentinelSpec {
                replicas: sentinel_replicas,
                ..Default::default()
            },
            auth: AuthSpec::default(),
            bootstrap_node: None,
            instance_manager_image: None,
        },
        status: None,
    }
}
