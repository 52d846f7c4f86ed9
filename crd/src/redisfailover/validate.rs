//! Defaulting and validation for `RedisFailover`, grounded in
//! `original_source/api/valkeyfailover/v1/validate.go` (the Redis CRD's
//! own `validate.go` was not retained in the retrieval pack, but its
//! sibling kind is structurally identical, so the logic is mirrored here).

use super::defaults::{
    bootstrapping_redis_custom_config, default_redis_custom_config, default_sentinel_custom_config,
    deduplicate, DEFAULT_EXPORTER_IMAGE, DEFAULT_IMAGE, DEFAULT_REDIS_NUMBER, DEFAULT_REDIS_PORT,
    DEFAULT_SENTINEL_EXPORTER_IMAGE, DEFAULT_SENTINEL_NUMBER, MAX_NAME_LENGTH,
};
use super::RedisFailover;
use crate::common::HEALTHY_STATE;
use crate::error::{Error, Result};

impl RedisFailover {
    /// Applies defaults in place and validates the spec, mirroring
    /// `(*ValkeyFailover).Validate()`. Called at admission time and again
    /// at the top of every reconciliation (`spec.md` I5).
    pub fn apply_defaults_and_validate(&mut self) -> Result<()> {
        let name = self.metadata.name.clone().unwrap_or_default();
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong {
                actual: name.chars().count(),
                max: MAX_NAME_LENGTH,
                name,
            });
        }

        if let Some(node) = self.spec.bootstrap_node.as_mut() {
            if node.host.is_empty() {
                return Err(Error::BootstrapNodeMissingHost);
            }
            if node.port.is_empty() {
                node.port = DEFAULT_REDIS_PORT.to_string();
            }
            let seed = bootstrapping_redis_custom_config();
            self.spec.redis.custom_config = deduplicate(
                seed.into_iter()
                    .chain(std::mem::take(&mut self.spec.redis.custom_config)),
            );
        } else {
            let seed = default_redis_custom_config();
            self.spec.redis.custom_config = deduplicate(
                seed.into_iter()
                    .chain(std::mem::take(&mut self.spec.redis.custom_config)),
            );
        }

        if self.spec.redis.image.is_empty() {
            self.spec.redis.image = DEFAULT_IMAGE.to_string();
        }
        if self.spec.sentinel.image.is_empty() {
            self.spec.sentinel.image = DEFAULT_IMAGE.to_string();
        }
        if self.spec.redis.replicas <= 0 {
            self.spec.redis.replicas = DEFAULT_REDIS_NUMBER;
        }
        if self.spec.redis.port <= 0 {
            self.spec.redis.port = DEFAULT_REDIS_PORT;
        }
        if self.spec.sentinel.replicas <= 0 {
            self.spec.sentinel.replicas = DEFAULT_SENTINEL_NUMBER;
        }
        if self.spec.redis.exporter.image.is_empty() {
            self.spec.redis.exporter.image = DEFAULT_EXPORTER_IMAGE.to_string();
        }
        if self.spec.sentinel.exporter.image.is_empty() {
            self.spec.sentinel.exporter.image = DEFAULT_SENTINEL_EXPORTER_IMAGE.to_string();
        }
        if self.spec.sentinel.custom_config.is_empty() {
            self.spec.sentinel.custom_config = default_sentinel_custom_config();
        }

        if self.status.is_none() {
            let mut status = crate::common::FailoverStatus::default();
            status.state = HEALTHY_STATE.to_string();
            self.status = Some(status);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AuthSpec, BootstrapNode, EngineSpec, SentinelSpec};
    use crate::redisfailover::RedisFailoverSpec;
    use kube::core::ObjectMeta;

    fn make(name: &str) -> RedisFailover {
        RedisFailover {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: RedisFailoverSpec {
                redis: EngineSpec::default(),
                sentinel: SentinelSpec::default(),
                auth: AuthSpec::default(),
                bootstrap_node: None,
                instance_manager_image: None,
            },
            status: None,
        }
    }

    #[test]
    fn name_length_exactly_48_passes() {
        let name = "a".repeat(48);
        let mut rf = make(&name);
        assert!(rf.apply_defaults_and_validate().is_ok());
    }

    #[test]
    fn name_length_49_fails() {
        let name = "a".repeat(49);
        let mut rf = make(&name);
        let err = rf.apply_defaults_and_validate().unwrap_err();
        assert!(matches!(err, Error::NameTooLong { .. }));
    }

    #[test]
    fn bootstrap_node_defaults_port_and_pins_priority_zero() {
        let mut rf = make("bootstrapped");
        rf.spec.bootstrap_node = Some(BootstrapNode {
            host: "10.0.0.9".to_string(),
            port: String::new(),
            allow_sentinels: false,
        });
        rf.apply_defaults_and_validate().unwrap();
        assert_eq!(rf.spec.bootstrap_node.as_ref().unwrap().port, "6379");
        assert!(rf
            .spec
            .redis
            .custom_config
            .contains(&"replica-priority 0".to_string()));
    }

    #[test]
    fn bootstrap_node_without_host_is_rejected() {
        let mut rf = make("bad");
        rf.spec.bootstrap_node = Some(BootstrapNode {
            host: String::new(),
            port: String::new(),
            allow_sentinels: false,
        });
        let err = rf.apply_defaults_and_validate().unwrap_err();
        assert!(matches!(err, Error::BootstrapNodeMissingHost));
    }

    #[test]
    fn defaults_fill_images_and_replica_counts() {
        let mut rf = make("defaults");
        rf.apply_defaults_and_validate().unwrap();
        assert_eq!(rf.spec.redis.image, DEFAULT_IMAGE);
        assert_eq!(rf.spec.redis.replicas, DEFAULT_REDIS_NUMBER);
        assert_eq!(rf.spec.sentinel.replicas, DEFAULT_SENTINEL_NUMBER);
        assert_eq!(rf.spec.redis.port, DEFAULT_REDIS_PORT);
        assert_eq!(rf.status.as_ref().unwrap().state, HEALTHY_STATE);
    }
}
