//! `kube::Api` backed implementation

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ResourceApi;

/// [`ResourceApi`] talking to a real cluster
pub struct KubeApi<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeApi<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeApi<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> ResourceApi<K> for KubeApi<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, kube::Error> {
        self.api(namespace).get(name).await
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        self.api(namespace)
            .create(&PostParams::default(), object)
            .await
    }

    async fn update(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        let name = object.name_any();
        self.api(namespace)
            .replace(&name, &PostParams::default(), object)
            .await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        // Background propagation: the call returns once the object is marked
        self.api(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, kube::Error> {
        let params = ListParams::default().labels(label_selector);
        Ok(self.api(namespace).list(&params).await?.items)
    }
}
