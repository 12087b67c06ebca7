//! In-memory cluster for testing
//!
//! [`MockApi`] stores objects keyed by namespace and name and answers with
//! the same status codes the API server would (404, 409), so reconcilers,
//! waiters and orchestrators can be exercised without a cluster.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::core::ErrorResponse;
use kube::{Resource, ResourceExt};

use super::{Cluster, ResourceApi};

type Key = (String, String);
type GetHook<K> = Arc<dyn Fn(&mut K) + Send + Sync>;

/// API primitive, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Update,
    Delete,
    List,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub lists: usize,
}

/// In-memory [`ResourceApi`] for one resource kind
pub struct MockApi<K> {
    state: Arc<MockState<K>>,
}

struct MockState<K> {
    /// Storage: (namespace, name) -> object
    store: RwLock<BTreeMap<Key, K>>,
    /// Track operation counts for assertions
    operations: RwLock<OperationCounts>,
    /// Objects marked for deletion -> reads left before they disappear
    terminating: RwLock<HashMap<Key, usize>>,
    /// Reads a deleted object stays visible for
    deletion_delay: RwLock<usize>,
    /// Injected failures: operation -> HTTP status code
    failures: RwLock<HashMap<Operation, u16>>,
    /// Applied to the stored object on every get
    get_hook: RwLock<Option<GetHook<K>>>,
    next_version: AtomicU64,
}

impl<K> Clone for MockApi<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K> Default for MockApi<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> MockApi<K> {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                store: RwLock::new(BTreeMap::new()),
                operations: RwLock::new(OperationCounts::default()),
                terminating: RwLock::new(HashMap::new()),
                deletion_delay: RwLock::new(0),
                failures: RwLock::new(HashMap::new()),
                get_hook: RwLock::new(None),
                next_version: AtomicU64::new(1),
            }),
        }
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.state.operations.read().unwrap().clone()
    }

    /// Keep deleted objects visible for `reads` further gets
    pub fn set_deletion_delay(&self, reads: usize) {
        *self.state.deletion_delay.write().unwrap() = reads;
    }

    /// Make every call of `operation` fail with `code`
    pub fn fail_on(&self, operation: Operation, code: u16) {
        self.state.failures.write().unwrap().insert(operation, code);
    }

    pub fn clear_failures(&self) {
        self.state.failures.write().unwrap().clear();
    }

    /// Mutate the stored object on every get (simulates controllers)
    pub fn on_get(&self, hook: impl Fn(&mut K) + Send + Sync + 'static) {
        *self.state.get_hook.write().unwrap() = Some(Arc::new(hook));
    }

    /// Count stored objects
    pub fn len(&self) -> usize {
        self.state.store.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.state
            .store
            .read()
            .unwrap()
            .contains_key(&key(namespace, name))
    }

    fn count(&self, operation: Operation) {
        let mut ops = self.state.operations.write().unwrap();
        match operation {
            Operation::Get => ops.gets += 1,
            Operation::Create => ops.creates += 1,
            Operation::Update => ops.updates += 1,
            Operation::Delete => ops.deletes += 1,
            Operation::List => ops.lists += 1,
        }
    }

    fn injected(&self, operation: Operation) -> Result<(), kube::Error> {
        match self.state.failures.read().unwrap().get(&operation) {
            Some(&code) => Err(api_error(code, "InternalError", "injected failure")),
            None => Ok(()),
        }
    }

    fn next_version(&self) -> String {
        self.state
            .next_version
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }
}

impl<K: Resource<DynamicType = ()> + Clone> MockApi<K> {
    /// Seed an object, bypassing ownership checks and counters
    pub fn insert(&self, mut object: K) {
        let namespace = object.namespace().unwrap_or_else(|| "default".to_string());
        object.meta_mut().namespace = Some(namespace.clone());
        if object.meta().resource_version.is_none() {
            object.meta_mut().resource_version = Some(self.next_version());
        }
        let name = object.name_any();
        self.state
            .store
            .write()
            .unwrap()
            .insert(key(&namespace, &name), object);
    }

    /// Current stored object, without counting a read or running the hook
    pub fn snapshot(&self, namespace: &str, name: &str) -> Option<K> {
        self.state
            .store
            .read()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }

    fn not_found(name: &str) -> kube::Error {
        api_error(
            404,
            "NotFound",
            &format!("{} \"{}\" not found", K::kind(&()), name),
        )
    }
}

#[async_trait]
impl<K> ResourceApi<K> for MockApi<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, kube::Error> {
        self.count(Operation::Get);
        self.injected(Operation::Get)?;

        let k = key(namespace, name);
        {
            let mut terminating = self.state.terminating.write().unwrap();
            if let Some(left) = terminating.get_mut(&k) {
                if *left == 0 {
                    terminating.remove(&k);
                    self.state.store.write().unwrap().remove(&k);
                    return Err(Self::not_found(name));
                }
                *left -= 1;
            }
        }

        let hook = self.state.get_hook.read().unwrap().clone();
        let mut store = self.state.store.write().unwrap();
        let object = store.get_mut(&k).ok_or_else(|| Self::not_found(name))?;
        if let Some(hook) = hook {
            hook(object);
        }
        Ok(object.clone())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        self.count(Operation::Create);
        self.injected(Operation::Create)?;

        let name = object.name_any();
        let k = key(namespace, &name);
        let mut store = self.state.store.write().unwrap();
        if store.contains_key(&k) {
            return Err(api_error(
                409,
                "AlreadyExists",
                &format!("{} \"{}\" already exists", K::kind(&()), name),
            ));
        }

        let mut stored = object.clone();
        stored.meta_mut().namespace = Some(namespace.to_string());
        stored.meta_mut().resource_version = Some(self.next_version());
        store.insert(k, stored.clone());
        Ok(stored)
    }

    async fn update(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        self.count(Operation::Update);
        self.injected(Operation::Update)?;

        let name = object.name_any();
        let k = key(namespace, &name);
        let mut store = self.state.store.write().unwrap();
        let current = store.get(&k).ok_or_else(|| Self::not_found(&name))?;

        if object.meta().resource_version != current.meta().resource_version {
            return Err(api_error(
                409,
                "Conflict",
                &format!(
                    "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
                    K::kind(&()),
                    name
                ),
            ));
        }

        let mut stored = object.clone();
        stored.meta_mut().namespace = Some(namespace.to_string());
        stored.meta_mut().resource_version = Some(self.next_version());
        store.insert(k, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        self.count(Operation::Delete);
        self.injected(Operation::Delete)?;

        let k = key(namespace, name);
        let delay = *self.state.deletion_delay.read().unwrap();
        // Lock order matches get(): terminating before store
        let mut terminating = self.state.terminating.write().unwrap();
        let mut store = self.state.store.write().unwrap();
        if !store.contains_key(&k) {
            return Err(Self::not_found(name));
        }

        if delay == 0 {
            store.remove(&k);
        } else {
            terminating.entry(k).or_insert(delay);
        }
        Ok(())
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, kube::Error> {
        self.count(Operation::List);
        self.injected(Operation::List)?;

        let store = self.state.store.read().unwrap();
        Ok(store
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, object)| object)
            .filter(|object| selector_matches(label_selector, object.labels()))
            .cloned()
            .collect())
    }
}

/// In-memory stores for every kind kubedrop touches
#[derive(Clone, Default)]
pub struct MockCluster {
    pub workloads: MockApi<Deployment>,
    pub services: MockApi<Service>,
    pub ingresses: MockApi<Ingress>,
    pub claims: MockApi<PersistentVolumeClaim>,
    pub pods: MockApi<Pod>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Cluster`] sharing these stores
    pub fn cluster(&self) -> Cluster {
        Cluster {
            workloads: Arc::new(self.workloads.clone()),
            services: Arc::new(self.services.clone()),
            ingresses: Arc::new(self.ingresses.clone()),
            claims: Arc::new(self.claims.clone()),
            pods: Arc::new(self.pods.clone()),
        }
    }

    /// Keep deleted objects of every kind visible for `reads` further gets
    pub fn set_deletion_delay(&self, reads: usize) {
        self.workloads.set_deletion_delay(reads);
        self.services.set_deletion_delay(reads);
        self.ingresses.set_deletion_delay(reads);
        self.claims.set_deletion_delay(reads);
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    })
}

/// Equality-based label selector matching (`a=b,c!=d,e`)
fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((k, v)) = term.split_once("!=") {
                labels.get(k.trim()).map(String::as_str) != Some(v.trim())
            } else if let Some((k, v)) = term.split_once('=') {
                let v = v.trim_start_matches('=');
                labels.get(k.trim()).map(String::as_str) == Some(v.trim())
            } else {
                labels.contains_key(term)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_map(name: &str, labels: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn status_code(result: Result<impl Sized, kube::Error>) -> u16 {
        match result {
            Err(kube::Error::Api(resp)) => resp.code,
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected an API error"),
        }
    }

    #[tokio::test]
    async fn test_mock_create_and_get() {
        let api = MockApi::<ConfigMap>::new();

        let created = api.create("default", &config_map("app", &[])).await.unwrap();
        assert!(created.metadata.resource_version.is_some());

        let fetched = api.get("default", "app").await.unwrap();
        assert_eq!(fetched.name_any(), "app");

        let counts = api.operation_counts();
        assert_eq!(counts.creates, 1);
        assert_eq!(counts.gets, 1);
    }

    #[tokio::test]
    async fn test_mock_create_duplicate_fails() {
        let api = MockApi::<ConfigMap>::new();
        api.create("default", &config_map("app", &[])).await.unwrap();

        let result = api.create("default", &config_map("app", &[])).await;
        assert_eq!(status_code(result), 409);
    }

    #[tokio::test]
    async fn test_mock_get_not_found() {
        let api = MockApi::<ConfigMap>::new();
        assert_eq!(status_code(api.get("default", "missing").await), 404);
    }

    #[tokio::test]
    async fn test_mock_namespaces_are_isolated() {
        let api = MockApi::<ConfigMap>::new();
        api.create("staging", &config_map("app", &[])).await.unwrap();

        assert_eq!(status_code(api.get("default", "app").await), 404);
        assert!(api.get("staging", "app").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_update_requires_current_version() {
        let api = MockApi::<ConfigMap>::new();
        let created = api.create("default", &config_map("app", &[])).await.unwrap();

        // No resourceVersion carried over
        let stale = config_map("app", &[("x", "1")]);
        assert_eq!(status_code(api.update("default", &stale).await), 409);

        let mut fresh = config_map("app", &[("x", "2")]);
        fresh.metadata.resource_version = created.metadata.resource_version.clone();
        let updated = api.update("default", &fresh).await.unwrap();
        assert_ne!(
            updated.metadata.resource_version,
            created.metadata.resource_version
        );
    }

    #[tokio::test]
    async fn test_mock_delayed_deletion() {
        let api = MockApi::<ConfigMap>::new();
        api.insert(config_map("app", &[]));
        api.set_deletion_delay(2);

        api.delete("default", "app").await.unwrap();
        assert!(api.get("default", "app").await.is_ok());
        assert!(api.get("default", "app").await.is_ok());
        assert_eq!(status_code(api.get("default", "app").await), 404);
        assert!(api.is_empty());
    }

    #[tokio::test]
    async fn test_mock_list_with_selector() {
        let api = MockApi::<ConfigMap>::new();
        api.insert(config_map("a", &[("release", "one"), ("tier", "web")]));
        api.insert(config_map("b", &[("release", "two"), ("tier", "web")]));
        api.insert(config_map("c", &[("release", "one")]));

        let one = api.list("default", "release=one").await.unwrap();
        assert_eq!(one.len(), 2);

        let web_one = api.list("default", "release==one,tier").await.unwrap();
        assert_eq!(web_one.len(), 1);
        assert_eq!(web_one[0].name_any(), "a");

        let not_one = api.list("default", "release!=one").await.unwrap();
        assert_eq!(not_one.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_injected_failure() {
        let api = MockApi::<ConfigMap>::new();
        api.fail_on(Operation::Create, 500);

        let result = api.create("default", &config_map("app", &[])).await;
        assert_eq!(status_code(result), 500);
        assert!(api.is_empty());

        api.clear_failures();
        assert!(api.create("default", &config_map("app", &[])).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_get_hook() {
        let api = MockApi::<ConfigMap>::new();
        api.insert(config_map("app", &[]));
        api.on_get(|cm| {
            cm.data
                .get_or_insert_with(Default::default)
                .insert("seen".to_string(), "yes".to_string());
        });

        let fetched = api.get("default", "app").await.unwrap();
        assert_eq!(fetched.data.unwrap()["seen"], "yes");
    }
}
