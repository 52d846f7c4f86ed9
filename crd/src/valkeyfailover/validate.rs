//! Defaulting and validation for `ValkeyFailover`, grounded directly in
//! `original_source/api/valkeyfailover/v1/validate.go`.

use super::defaults::{
    bootstrapping_valkey_custom_config, deduplicate, default_sentinel_custom_config,
    default_valkey_custom_config, DEFAULT_EXPORTER_IMAGE, DEFAULT_IMAGE, DEFAULT_SENTINEL_EXPORTER_IMAGE,
    DEFAULT_SENTINEL_NUMBER, DEFAULT_VALKEY_NUMBER, DEFAULT_VALKEY_PORT, MAX_NAME_LENGTH,
};
use super::ValkeyFailover;
use crate::common::HEALTHY_STATE;
use crate::error::{Error, Result};

impl ValkeyFailover {
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
                node.port = DEFAULT_VALKEY_PORT.to_string();
            }
            let seed = bootstrapping_valkey_custom_config();
            self.spec.valkey.custom_config = deduplicate(
                seed.into_iter()
                    .chain(std::mem::take(&mut self.spec.valkey.custom_config)),
            );
        } else {
            let seed = default_valkey_custom_config();
            self.spec.valkey.custom_config = deduplicate(
                seed.into_iter()
                    .chain(std::mem::take(&mut self.spec.valkey.custom_config)),
            );
        }

        if self.spec.valkey.image.is_empty() {
            self.spec.valkey.image = DEFAULT_IMAGE.to_string();
        }
        if self.spec.sentinel.image.is_empty() {
            self.spec.sentinel.image = DEFAULT_IMAGE.to_string();
        }
        if self.spec.valkey.replicas <= 0 {
            self.spec.valkey.replicas = DEFAULT_VALKEY_NUMBER;
        }
        if self.spec.valkey.port <= 0 {
            self.spec.valkey.port = DEFAULT_VALKEY_PORT;
        }
        if self.spec.sentinel.replicas <= 0 {
            self.spec.sentinel.replicas = DEFAULT_SENTINEL_NUMBER;
        }
        if self.spec.valkey.exporter.image.is_empty() {
            self.spec.valkey.exporter.image = DEFAULT_EXPORTER_IMAGE.to_string();
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
