//! Pure `spec -> desired object` functions (`spec.md` §4.5).
//!
//! Every generator takes a `&dyn FailoverResource` and returns a fully
//! populated object carrying an owner reference back to the custom
//! resource, so cascade deletion works without the ensurer having to know
//! about ownership (`spec.md` §3 invariant I4). Grounded in the
//! struct-literal object-construction idiom from `manager.rs` (teacher),
//! generalized from one hardcoded `ZooKeeperCluster` owner to any
//! `FailoverResource`.

mod configmap;
mod deployment;
mod pdb;
mod rbac;
mod service;
mod statefulset;

pub use configmap::{redis_configmap, sentinel_configmap};
pub use deployment::sentinel_deployment;
pub use pdb::{redis_pod_disruption_budget, sentinel_pod_disruption_budget};
pub use rbac::{role, role_binding, service_account};
pub use service::{redis_master_service, redis_readonly_service, sentinel_service};
pub use statefulset::redis_stateful_set;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use redisfailover_crd::FailoverResource;
use std::collections::BTreeMap;

pub(crate) use crate::names::{REDIS_COMPONENT, SENTINEL_COMPONENT};
use crate::names::{COMPONENT_LABEL_KEY, FAILOVER_NAME_LABEL_KEY};

pub(crate) fn selector_labels(resource: &dyn FailoverResource, component: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(FAILOVER_NAME_LABEL_KEY.to_string(), resource.name().to_string());
    labels.insert(COMPONENT_LABEL_KEY.to_string(), component.to_string());
    labels
}

pub(crate) fn label_selector(resource: &dyn FailoverResource, component: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(selector_labels(resource, component)),
        ..Default::default()
    }
}

/// `rfr-<name>` / `rfs-<name>`-prefixed metadata with the owner reference
/// and selector labels every generated object needs.
pub(crate) fn object_meta(
    resource: &dyn FailoverResource,
    owned_name: String,
    component: &str,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(owned_name),
        namespace: Some(resource.namespace().to_string()),
        labels: Some(selector_labels(resource, component)),
        owner_references: owner_reference(resource).map(|o| vec![o]),
        ..Default::default()
    }
}

/// `spec.md` §3 I4: "All managed objects carry owner-reference to the
/// custom resource (cascade delete)." `None` only when the in-memory
/// object lacks a UID (never observed for objects fetched from the API
/// server; guarded rather than assumed to avoid orphaning objects on a
/// malformed in-memory fixture).
pub(crate) fn owner_reference(resource: &dyn FailoverResource) -> Option<OwnerReference> {
    Some(OwnerReference {
        api_version: "redisoperator.io/v1".to_string(),
        kind: resource.kind_label().to_string(),
        name: resource.name().to_string(),
        uid: resource.uid()?.to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
