//! The Sentinel deployment (`rfs-<name>`), created only while
//! `SentinelsAllowed` holds; the reconciler deletes it explicitly when that
//! flips false (`spec.md` §4.2).

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use redisfailover_crd::FailoverResource;

use super::{label_selector, object_meta, selector_labels, SENTINEL_COMPONENT};
use crate::names;

pub fn sentinel_deployment(resource: &dyn FailoverResource) -> Deployment {
    let sentinel = resource.sentinel();
    let name = names::sentinel_name(resource.name());

    let container = Container {
        name: SENTINEL_COMPONENT.to_string(),
        image: Some(sentinel.image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some("sentinel".to_string()),
            container_port: 26379,
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: object_meta(resource, name, SENTINEL_COMPONENT),
        spec: Some(DeploymentSpec {
            replicas: Some(sentinel.replicas.max(1)),
            selector: label_selector(resource, SENTINEL_COMPONENT),
            template: PodTemplateSpec {
                metadata: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                    labels: Some(selector_labels(resource, SENTINEL_COMPONENT)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(names::service_account_name(resource.name())),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
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
    fn identity_and_replica_count_follow_spec() {
        let rf = test_redis_failover("prod", 3, 3);
        let deploy = sentinel_deployment(&rf);
        assert_eq!(deploy.metadata.name.as_deref(), Some("rfs-prod"));
        assert_eq!(deploy.spec.unwrap().replicas, Some(3));
    }
}
