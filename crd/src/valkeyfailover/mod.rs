mod bootstrapping;
mod defaults;
mod validate;

pub use defaults::*;

use crate::common::{
    AuthSpec, BootstrapNode, EngineSpec, FailoverResource, FailoverStatus, SentinelSpec,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `ValkeyFailover` mirrors `RedisFailover`'s schema for the Valkey fork
/// (`original_source/api/valkeyfailover/v1/*`); the reconciliation core is
/// kind-agnostic over both through `FailoverResource`.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "redisoperator.io",
    version = "v1",
    kind = "ValkeyFailover",
    shortname = "vf",
    namespaced
)]
#[kube(status = "FailoverStatus")]
#[serde(rename_all = "camelCase")]
pub struct ValkeyFailoverSpec {
    #[serde(default)]
    pub valkey: EngineSpec,
    #[serde(default)]
    pub sentinel: SentinelSpec,
    #[serde(default)]
    pub auth: AuthSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_node: Option<BootstrapNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_manager_image: Option<String>,
}

impl FailoverResource for ValkeyFailover {
    fn kind_label(&self) -> &'static str {
        "valkeyfailover"
    }

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    fn uid(&self) -> Option<&str> {
        self.metadata.uid.as_deref()
    }

    fn engine(&self) -> &EngineSpec {
        &self.spec.valkey
    }

    fn sentinel(&self) -> &SentinelSpec {
        &self.spec.sentinel
    }

    fn auth(&self) -> &AuthSpec {
        &self.spec.auth
    }

    fn bootstrap_node(&self) -> Option<&BootstrapNode> {
        self.spec.bootstrap_node.as_ref()
    }

    fn instance_manager_image(&self) -> Option<&str> {
        self.spec.instance_manager_image.as_deref()
    }

    fn status(&self) -> &FailoverStatus {
        static DEFAULT: std::sync::OnceLock<FailoverStatus> = std::sync::OnceLock::new();
        self.status
            .as_ref()
            .unwrap_or_else(|| DEFAULT.get_or_init(FailoverStatus::default))
    }

    fn apply_defaults_and_validate(&mut self) -> crate::error::Result<()> {
        ValkeyFailover::apply_defaults_and_validate(self)
    }
}
