//! Service account, role, and role binding granting the Redis pods (via
//! their instance-manager sidecar) permission to read their own pod/service
//! objects. Minimal: the RBAC surface is not elaborated beyond what the
//! instance-manager collaborator needs (`spec.md` §1 out-of-core note on
//! rendering detail).

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use redisfailover_crd::FailoverResource;

use super::{object_meta, REDIS_COMPONENT};
use crate::names;

pub fn service_account(resource: &dyn FailoverResource) -> ServiceAccount {
    ServiceAccount {
        metadata: object_meta(
            resource,
            names::service_account_name(resource.name()),
            REDIS_COMPONENT,
        ),
        ..Default::default()
    }
}

pub fn role(resource: &dyn FailoverResource) -> Role {
    let name = names::service_account_name(resource.name());
    Role {
        metadata: object_meta(resource, name, REDIS_COMPONENT),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec!["".to_string()]),
            resources: Some(vec!["pods".to_string(), "services".to_string()]),
            verbs: vec!["get".to_string(), "list".to_string(), "watch".to_string()],
            ..Default::default()
        }]),
    }
}

pub fn role_binding(resource: &dyn FailoverResource) -> RoleBinding {
    let name = names::service_account_name(resource.name());
    RoleBinding {
        metadata: object_meta(resource, name.clone(), REDIS_COMPONENT),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: name.clone(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name,
            namespace: Some(resource.namespace().to_string()),
            ..Default::default()
        }]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_redis_failover;

    #[test]
    fn role_binding_references_matching_role_and_service_account() {
        let rf = test_redis_failover("prod", 3, 3);
        let rb = role_binding(&rf);
        assert_eq!(rb.role_ref.name, "rfr-prod");
        let subject = &rb.subjects.unwrap()[0];
        assert_eq!(subject.name, "rfr-prod");
        assert_eq!(subject.namespace.as_deref(), Some("default"));
    }
}
