//! Generic `CreateOrUpdate` ensurer (`spec.md` §4.2), run in the fixed
//! order: configmaps -> service accounts -> roles/rolebindings -> services
//! -> stateful set -> deployment (if allowed) -> PDBs. Every step is
//! idempotent and safe to retry; the server's resource-version check is
//! the only conflict mechanism (enforced inside `OrchestratorClient`'s
//! apply-patch, not here).

use redisfailover_crd::FailoverResource;

use crate::error::Result;
use crate::generators;
use crate::k8s_client::OrchestratorClient;
use crate::names;

/// Config lines already merged (defaults + custom, deduplicated) by
/// `FailoverResource::apply_defaults_and_validate`, which the controller
/// runs on the object before handing it to the reconciler, so the ensurer
/// stays a pure pass-through of generator output.
pub struct EnsureInputs<'a> {
    pub redis_custom_config: &'a [String],
    pub sentinel_custom_config: &'a [String],
    pub sentinels_allowed: bool,
}

/// Ensures every managed object for `resource` matches the generator's
/// output, in the order `spec.md` §4.2 requires (earlier objects must
/// exist before later ones can start).
pub async fn ensure(
    orchestrator: &dyn OrchestratorClient,
    resource: &dyn FailoverResource,
    inputs: &EnsureInputs<'_>,
) -> Result<()> {
    let namespace = resource.namespace();

    orchestrator
        .create_or_update_configmap(
            namespace,
            generators::redis_configmap(resource, inputs.redis_custom_config),
        )
        .await?;
    if inputs.sentinels_allowed {
        orchestrator
            .create_or_update_configmap(
                namespace,
                generators::sentinel_configmap(resource, inputs.sentinel_custom_config),
            )
            .await?;
    }

    orchestrator
        .create_or_update_service_account(namespace, generators::service_account(resource))
        .await?;
    orchestrator
        .create_or_update_role(namespace, generators::role(resource))
        .await?;
    orchestrator
        .create_or_update_role_binding(namespace, generators::role_binding(resource))
        .await?;

    orchestrator
        .create_or_update_service(namespace, generators::redis_readonly_service(resource))
        .await?;
    orchestrator
        .create_or_update_service(namespace, generators::redis_master_service(resource))
        .await?;
    if inputs.sentinels_allowed {
        orchestrator
            .create_or_update_service(namespace, generators::sentinel_service(resource))
            .await?;
    } else {
        orchestrator
            .delete_service(namespace, &names::sentinel_service_name(resource.name()))
            .await?;
    }

    orchestrator
        .create_or_update_stateful_set(namespace, generators::redis_stateful_set(resource))
        .await?;

    if inputs.sentinels_allowed {
        orchestrator
            .create_or_update_deployment(namespace, generators::sentinel_deployment(resource))
            .await?;
    } else {
        // `spec.md` §4.2: "deletion is explicit (e.g., when SentinelsAllowed
        // falls to false, the reconciler calls DeleteDeployment)".
        orchestrator
            .delete_deployment(namespace, &names::sentinel_name(resource.name()))
            .await?;
    }

    orchestrator
        .create_or_update_pod_disruption_budget(
            namespace,
            generators::redis_pod_disruption_budget(resource),
        )
        .await?;
    if inputs.sentinels_allowed {
        orchestrator
            .create_or_update_pod_disruption_budget(
                namespace,
                generators::sentinel_pod_disruption_budget(resource),
            )
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_redis_failover;
    use async_trait::async_trait;
    use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
    use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret, Service, ServiceAccount};
    use k8s_openapi::api::policy::v1::PodDisruptionBudget;
    use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<String>>,
        deployment_deleted: Mutex<bool>,
    }

    #[async_trait]
    impl OrchestratorClient for RecordingClient {
        async fn get_configmap(&self, _ns: &str, _name: &str) -> Result<Option<ConfigMap>> {
            Ok(None)
        }
        async fn create_or_update_configmap(&self, _ns: &str, object: ConfigMap) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("configmap:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn get_service_account(&self, _ns: &str, _name: &str) -> Result<Option<ServiceAccount>> {
            Ok(None)
        }
        async fn create_or_update_service_account(&self, _ns: &str, object: ServiceAccount) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("serviceaccount:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn get_role(&self, _ns: &str, _name: &str) -> Result<Option<Role>> {
            Ok(None)
        }
        async fn create_or_update_role(&self, _ns: &str, object: Role) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("role:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn get_role_binding(&self, _ns: &str, _name: &str) -> Result<Option<RoleBinding>> {
            Ok(None)
        }
        async fn create_or_update_role_binding(&self, _ns: &str, object: RoleBinding) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("rolebinding:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn get_service(&self, _ns: &str, _name: &str) -> Result<Option<Service>> {
            Ok(None)
        }
        async fn create_or_update_service(&self, _ns: &str, object: Service) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("service:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn delete_service(&self, _ns: &str, name: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("delete-service:{name}"));
            Ok(())
        }
        async fn get_stateful_set(&self, _ns: &str, _name: &str) -> Result<Option<StatefulSet>> {
            Ok(None)
        }
        async fn create_or_update_stateful_set(&self, _ns: &str, object: StatefulSet) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("statefulset:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn get_deployment(&self, _ns: &str, _name: &str) -> Result<Option<Deployment>> {
            Ok(None)
        }
        async fn create_or_update_deployment(&self, _ns: &str, object: Deployment) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("deployment:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn delete_deployment(&self, _ns: &str, name: &str) -> Result<()> {
            *self.deployment_deleted.lock().unwrap() = true;
            self.calls.lock().unwrap().push(format!("delete-deployment:{name}"));
            Ok(())
        }
        async fn get_pod_disruption_budget(&self, _ns: &str, _name: &str) -> Result<Option<PodDisruptionBudget>> {
            Ok(None)
        }
        async fn create_or_update_pod_disruption_budget(&self, _ns: &str, object: PodDisruptionBudget) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("pdb:{}", object.metadata.name.unwrap()));
            Ok(())
        }
        async fn get_secret(&self, _ns: &str, _name: &str) -> Result<Option<Secret>> {
            Ok(None)
        }
        async fn get_stateful_set_pods(&self, _ns: &str, _name: &str) -> Result<Vec<Pod>> {
            Ok(vec![])
        }
        async fn delete_pod(&self, _ns: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn update_pod_labels(&self, _ns: &str, _name: &str, _labels: BTreeMap<String, String>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn ensures_objects_in_the_documented_order() {
        let rf = test_redis_failover("prod", 3, 3);
        let client = RecordingClient::default();
        let inputs = EnsureInputs {
            redis_custom_config: &[],
            sentinel_custom_config: &[],
            sentinels_allowed: true,
        };
        ensure(&client, &rf, &inputs).await.unwrap();
        let calls = client.calls.into_inner().unwrap();
        let kind_of = |c: &str| c.split(':').next().unwrap().to_string();
        let order: Vec<String> = calls.iter().map(|c| kind_of(c)).collect();
        let first_statefulset = order.iter().position(|k| k == "statefulset").unwrap();
        let first_service = order.iter().position(|k| k == "service").unwrap();
        let first_configmap = order.iter().position(|k| k == "configmap").unwrap();
        assert!(first_configmap < first_service);
        assert!(first_service < first_statefulset);
    }

    #[tokio::test]
    async fn sentinel_deployment_deleted_when_not_allowed() {
        let rf = test_redis_failover("prod", 3, 3);
        let client = RecordingClient::default();
        let inputs = EnsureInputs {
            redis_custom_config: &[],
            sentinel_custom_config: &[],
            sentinels_allowed: false,
        };
        ensure(&client, &rf, &inputs).await.unwrap();
        assert!(*client.deployment_deleted.lock().unwrap());
    }
}
