//! Structural types shared by `RedisFailoverSpec` and `ValkeyFailoverSpec`.
//!
//! The two custom resources are structurally identical (confirmed against
//! `original_source/api/redisfailover/v1` and `api/valkeyfailover/v1`); this
//! module holds the shared shape so it is defined once.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Engine-level configuration: image, replica count, port, and custom config
/// lines for the managed data-store pods (Redis or Valkey).
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct EngineSpec {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub custom_config: Vec<String>,
    #[serde(default)]
    pub exporter: ExporterSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ExporterSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub image: String,
}

/// Sentinel deployment configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SentinelSpec {
    /// `None` means "use the deployment default" (see `DefaultSentinelEnabled`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub custom_config: Vec<String>,
    #[serde(default)]
    pub exporter: ExporterSpec,
    /// Failover timeout in whole seconds. `None` defaults to 10s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_timeout_seconds: Option<u32>,
}

/// Reference to the secret holding the Redis/Valkey AUTH password.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct AuthSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

/// An external primary that this cluster's replicas attach to instead of
/// electing one of their own.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct BootstrapNode {
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub allow_sentinels: bool,
}

pub const HEALTHY_STATE: &str = "Healthy";
pub const NOT_HEALTHY_STATE: &str = "NotHealthy";

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct FailoverStatus {
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<Time>,
    #[serde(default)]
    pub message: String,
}

fn default_state() -> String {
    NOT_HEALTHY_STATE.to_string()
}

impl Default for FailoverStatus {
    fn default() -> Self {
        FailoverStatus {
            state: default_state(),
            last_changed: None,
            message: String::new(),
        }
    }
}

/// Kind-agnostic view over a `RedisFailover` or `ValkeyFailover` object.
///
/// The reconciler, checker, and healer are written once against this trait
/// (`spec.md` §9: "Dynamic dispatch over polymorphic settings") instead of
/// being duplicated per custom-resource kind.
pub trait FailoverResource: Send + Sync {
    /// Short name used to prefix owned objects, e.g. `"redisfailover"` / `"valkeyfailover"`.
    fn kind_label(&self) -> &'static str;
    /// The sentinel master name used in `SENTINEL MONITOR`/`GET-MASTER-ADDR-BY-NAME`.
    fn default_master_name(&self) -> &'static str {
        "mymaster"
    }

    fn name(&self) -> &str;
    fn namespace(&self) -> &str;
    fn uid(&self) -> Option<&str>;

    fn engine(&self) -> &EngineSpec;
    fn sentinel(&self) -> &SentinelSpec;
    fn auth(&self) -> &AuthSpec;
    fn bootstrap_node(&self) -> Option<&BootstrapNode>;
    fn instance_manager_image(&self) -> Option<&str>;

    fn status(&self) -> &FailoverStatus;

    /// Applies defaults in place and validates the spec (`spec.md` I5).
    /// Must run at the top of every reconciliation, before the object is
    /// handed to the reconciler, so Ensure/Check/Heal always see a
    /// defaulted, validated spec.
    fn apply_defaults_and_validate(&mut self) -> crate::error::Result<()>;
}

/// The historical default for sentinel-enablement has flipped across
/// versions (`spec.md` §9 Open Question); pinned here as the one
/// deployment-wide constant both `RedisFailover` and `ValkeyFailover`
/// resolve against (see each kind's `defaults` module for the
/// kind-specific copy used by its own inherent convenience methods).
pub const DEFAULT_SENTINEL_ENABLED: bool = true;

/// `Bootstrapping = (BootstrapNode ≠ ∅)`, computed generically over any
/// `FailoverResource` so the reconciler stays kind-agnostic.
pub fn bootstrapping(resource: &dyn FailoverResource) -> bool {
    resource.bootstrap_node().is_some()
}

/// `SentinelEnabled = spec.Sentinel.Enabled ?? DefaultSentinelEnabled`.
pub fn sentinel_enabled(resource: &dyn FailoverResource) -> bool {
    resource.sentinel().enabled.unwrap_or(DEFAULT_SENTINEL_ENABLED)
}

/// `SentinelsAllowed = SentinelEnabled ∧ (¬Bootstrapping ∨ BootstrapNode.AllowSentinels)`.
pub fn sentinels_allowed(resource: &dyn FailoverResource) -> bool {
    if !sentinel_enabled(resource) {
        return false;
    }
    match resource.bootstrap_node() {
        None => true,
        Some(node) => node.allow_sentinels,
    }
}

/// `OperatorManagedFailover = ¬SentinelEnabled`.
pub fn operator_managed_failover(resource: &dyn FailoverResource) -> bool {
    !sentinel_enabled(resource)
}

/// `Quorum = ⌊S/2⌋ + 1`.
pub fn quorum(resource: &dyn FailoverResource) -> i32 {
    resource.sentinel().replicas.max(1) / 2 + 1
}

#[cfg(test)]
mod generic_derived_boolean_tests {
    use super::*;
    use crate::redisfailover::{RedisFailover, RedisFailoverSpec};
    use kube::core::ObjectMeta;

    fn make(enabled: Option<bool>, bootstrap: Option<BootstrapNode>) -> RedisFailover {
        RedisFailover {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: RedisFailoverSpec {
                redis: EngineSpec::default(),
                sentinel: SentinelSpec {
                    enabled,
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
    fn generic_helpers_agree_with_the_inherent_methods() {
        let rf = make(None, None);
        assert_eq!(bootstrapping(&rf), rf.bootstrapping());
        assert_eq!(sentinel_enabled(&rf), rf.sentinel_enabled());
        assert_eq!(sentinels_allowed(&rf), rf.sentinels_allowed());
        assert_eq!(operator_managed_failover(&rf), rf.operator_managed_failover());
        assert_eq!(quorum(&rf), rf.quorum());
    }
}
