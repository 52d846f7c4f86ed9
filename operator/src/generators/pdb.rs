//! Pod-disruption budgets for the Redis stateful set and Sentinel
//! deployment, keeping at least one pod of each available during
//! voluntary disruption (node drain, cluster upgrade).

use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use redisfailover_crd::FailoverResource;

use super::{label_selector, object_meta, REDIS_COMPONENT, SENTINEL_COMPONENT};
use crate::names;

pub fn redis_pod_disruption_budget(resource: &dyn FailoverResource) -> PodDisruptionBudget {
    let name = names::redis_name(resource.name());
    PodDisruptionBudget {
        metadata: object_meta(resource, name, REDIS_COMPONENT),
        spec: Some(PodDisruptionBudgetSpec {
            min_available: Some(IntOrString::Int(1)),
            selector: Some(label_selector(resource, REDIS_COMPONENT)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn sentinel_pod_disruption_budget(resource: &dyn FailoverResource) -> PodDisruptionBudget {
    let name = names::sentinel_name(resource.name());
    PodDisruptionBudget {
        metadata: object_meta(resource, name, SENTINEL_COMPONENT),
        spec: Some(PodDisruptionBudgetSpec {
            min_available: Some(IntOrString::Int(1)),
            selector: Some(label_selector(resource, SENTINEL_COMPONENT)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_redis_failover;

    #[test]
    fn pdb_selects_same_labels_as_owning_workload() {
        let rf = test_redis_failover("prod", 3, 3);
        let pdb = redis_pod_disruption_budget(&rf);
        assert_eq!(pdb.metadata.name.as_deref(), Some("rfr-prod"));
        assert_eq!(
            pdb.spec.unwrap().min_available,
            Some(IntOrString::Int(1))
        );
    }
}
