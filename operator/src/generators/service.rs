//! Redis read-only/master services and the Sentinel service, selected by
//! role label (`spec.md` §4.4 action 8: "Labels exist for service
//! selectors").

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use redisfailover_crd::FailoverResource;
use std::collections::BTreeMap;

use super::{object_meta, selector_labels, REDIS_COMPONENT, SENTINEL_COMPONENT};
use crate::names::{self, REDIS_ROLE_LABEL_KEY, REDIS_ROLE_LABEL_MASTER};

fn port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    }
}

/// Selects every Redis pod for the component regardless of role; clients
/// needing read scaling connect here.
pub fn redis_readonly_service(resource: &dyn FailoverResource) -> Service {
    let redis_port = resource.engine().port.max(1);
    Service {
        metadata: object_meta(
            resource,
            names::redis_readonly_service_name(resource.name()),
            REDIS_COMPONENT,
        ),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(resource, REDIS_COMPONENT)),
            ports: Some(vec![port("redis", redis_port)]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Selects only the pod currently carrying the master role label.
pub fn redis_master_service(resource: &dyn FailoverResource) -> Service {
    let redis_port = resource.engine().port.max(1);
    let mut selector = selector_labels(resource, REDIS_COMPONENT);
    selector.insert(REDIS_ROLE_LABEL_KEY.to_string(), REDIS_ROLE_LABEL_MASTER.to_string());
    Service {
        metadata: object_meta(
            resource,
            names::redis_master_service_name(resource.name()),
            REDIS_COMPONENT,
        ),
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![port("redis", redis_port)]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn sentinel_service(resource: &dyn FailoverResource) -> Service {
    let mut ports: BTreeMap<&str, i32> = BTreeMap::new();
    ports.insert("sentinel", 26379);
    Service {
        metadata: object_meta(
            resource,
            names::sentinel_service_name(resource.name()),
            SENTINEL_COMPONENT,
        ),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(resource, SENTINEL_COMPONENT)),
            ports: Some(ports.into_iter().map(|(name, p)| port(name, p)).collect()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
