//! Typed CRUD over the orchestrator object model.
//!
//! Grounded in the `Services` interface retained at
//! `original_source/mocks/service/k8s/Services.go` (Get/Create/Update/
//! CreateOrUpdate/Delete per kind) and the modern `kube::Api<T>` idiom shown
//! by the pack's other operators (`get_opt`, `Patch::Apply`,
//! `PatchParams::apply(FIELD_MANAGER)`).

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret, Service, ServiceAccount};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;

use crate::error::Result;

pub const FIELD_MANAGER: &str = "redisfailover-operator";

/// Abstracts typed CRUD over every kind the ensurer and healer manage, so
/// the rest of the reconciliation engine never touches `kube::Api` directly
/// (`spec.md` §9: "the healer, checker, and ensurer consume three capability
/// interfaces").
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn get_configmap(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;
    async fn create_or_update_configmap(&self, namespace: &str, object: ConfigMap) -> Result<()>;

    async fn get_service_account(&self, namespace: &str, name: &str) -> Result<Option<ServiceAccount>>;
    async fn create_or_update_service_account(&self, namespace: &str, object: ServiceAccount) -> Result<()>;

    async fn get_role(&self, namespace: &str, name: &str) -> Result<Option<Role>>;
    async fn create_or_update_role(&self, namespace: &str, object: Role) -> Result<()>;

    async fn get_role_binding(&self, namespace: &str, name: &str) -> Result<Option<RoleBinding>>;
    async fn create_or_update_role_binding(&self, namespace: &str, object: RoleBinding) -> Result<()>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;
    async fn create_or_update_service(&self, namespace: &str, object: Service) -> Result<()>;
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>>;
    async fn create_or_update_stateful_set(&self, namespace: &str, object: StatefulSet) -> Result<()>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>>;
    async fn create_or_update_deployment(&self, namespace: &str, object: Deployment) -> Result<()>;
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<()>;

    async fn get_pod_disruption_budget(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodDisruptionBudget>>;
    async fn create_or_update_pod_disruption_budget(
        &self,
        namespace: &str,
        object: PodDisruptionBudget,
    ) -> Result<()>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    async fn get_stateful_set_pods(&self, namespace: &str, stateful_set_name: &str) -> Result<Vec<Pod>>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;
    async fn update_pod_labels(
        &self,
        namespace: &str,
        pod_name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<()>;
}

pub struct KubeOrchestratorClient {
    client: Client,
}

impl KubeOrchestratorClient {
    pub fn new(client: Client) -> Self {
        KubeOrchestratorClient { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + std::fmt::Debug
            + for<'de> serde::Deserialize<'de>
            + serde::Serialize,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn create_or_update<K>(&self, namespace: &str, name: &str, object: K) -> Result<()>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + std::fmt::Debug
            + for<'de> serde::Deserialize<'de>
            + serde::Serialize,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(namespace);
        match api.get_opt(name).await? {
            None => {
                api.create(&PostParams::default(), &object).await?;
            }
            Some(_) => {
                let patch = Patch::Apply(&object);
                api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &patch)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrchestratorClient for KubeOrchestratorClient {
    async fn get_configmap(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.api::<ConfigMap>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_configmap(&self, namespace: &str, object: ConfigMap) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }

    async fn get_service_account(&self, namespace: &str, name: &str) -> Result<Option<ServiceAccount>> {
        Ok(self.api::<ServiceAccount>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_service_account(&self, namespace: &str, object: ServiceAccount) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }

    async fn get_role(&self, namespace: &str, name: &str) -> Result<Option<Role>> {
        Ok(self.api::<Role>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_role(&self, namespace: &str, object: Role) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }

    async fn get_role_binding(&self, namespace: &str, name: &str) -> Result<Option<RoleBinding>> {
        Ok(self.api::<RoleBinding>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_role_binding(&self, namespace: &str, object: RoleBinding) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        Ok(self.api::<Service>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_service(&self, namespace: &str, object: Service) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Service> = self.api(namespace);
        match api.delete(name, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        Ok(self.api::<StatefulSet>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_stateful_set(&self, namespace: &str, object: StatefulSet) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        Ok(self.api::<Deployment>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_deployment(&self, namespace: &str, object: Deployment) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Deployment> = self.api(namespace);
        match api.delete(name, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_pod_disruption_budget(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodDisruptionBudget>> {
        Ok(self.api::<PodDisruptionBudget>(namespace).get_opt(name).await?)
    }
    async fn create_or_update_pod_disruption_budget(
        &self,
        namespace: &str,
        object: PodDisruptionBudget,
    ) -> Result<()> {
        let name = kube::ResourceExt::name_any(&object);
        self.create_or_update(namespace, &name, object).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.api::<Secret>(namespace).get_opt(name).await?)
    }

    async fn get_stateful_set_pods(&self, namespace: &str, stateful_set_name: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = self.api(namespace);
        let params = kube::api::ListParams::default()
            .labels(&format!("{}={}", crate::names::FAILOVER_NAME_LABEL_KEY, stateful_set_name));
        Ok(api.list(&params).await?.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Pod> = self.api(namespace);
        match api.delete(name, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_pod_labels(
        &self,
        namespace: &str,
        pod_name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<()> {
        let api: Api<Pod> = self.api(namespace);
        let patch = serde_json::json!({ "metadata": { "labels": labels } });
        api.patch(
            pod_name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(patch),
        )
        .await?;
        Ok(())
    }
}
