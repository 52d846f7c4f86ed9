//! The Redis stateful set (`rfr-<name>`). Rendering is contract-level only
//! (`spec.md` §1: "container spec, volume layout, init containers, metrics
//! sidecars" are out of scope) — this generator fixes the object's identity
//! (name, namespace, selector, replica count, port) and a single container
//! with the declared image, enough for the ensurer to diff and apply.

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use redisfailover_crd::FailoverResource;

use super::{label_selector, object_meta, selector_labels, REDIS_COMPONENT};
use crate::names;

pub fn redis_stateful_set(resource: &dyn FailoverResource) -> StatefulSet {
    let engine = resource.engine();
    let redis_port = engine.port.max(1);
    let name = names::redis_name(resource.name());

    let container = Container {
        name: REDIS_COMPONENT.to_string(),
        image: Some(engine.image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some("redis".to_string()),
            container_port: redis_port,
            ..Default::default()
        }]),
        ..Default::default()
    };

    StatefulSet {
        metadata: object_meta(resource, name.clone(), REDIS_COMPONENT),
        spec: Some(StatefulSetSpec {
            replicas: Some(engine.replicas.max(1)),
            service_name: names::redis_readonly_service_name(resource.name()),
            selector: label_selector(resource, REDIS_COMPONENT),
            template: PodTemplateSpec {
                metadata: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                    labels: Some(selector_labels(resource, REDIS_COMPONENT)),
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
