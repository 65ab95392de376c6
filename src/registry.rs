//! Resource registry.
//!
//! One `Registry` is built at startup and handed to every consumer. It owns
//! the shared state all resources read and write: the entity cache, the
//! collection handles and the in-flight trackers.

use crate::cache::EntityCache;
use crate::collection::CollectionStore;
use crate::config::ClientConfig;
use crate::definition::ResourceDefinition;
use crate::endpoint::UrlBuilder;
use crate::entity::{into_attributes, EntityRef, WriteMode};
use crate::error::{Error, Result};
use crate::guard::{guard_with_metrics, Guarded, Relevance};
use crate::inflight::InFlightTracker;
use crate::key::Signature;
use crate::observability::{NoOpMetrics, ResourceMetrics};
use crate::resource::Resource;
use crate::transport::{Request, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// State shared by every resource of one registry.
pub(crate) struct Core<T: Transport> {
    pub(crate) transport: T,
    pub(crate) urls: UrlBuilder,
    pub(crate) entities: EntityCache,
    pub(crate) collections: CollectionStore,
    pub(crate) fetches: InFlightTracker<EntityRef>,
    pub(crate) listings: InFlightTracker<Vec<EntityRef>>,
    pub(crate) writes: InFlightTracker<EntityRef>,
    pub(crate) removals: InFlightTracker<()>,
    pub(crate) actions: InFlightTracker<Value>,
    pub(crate) metrics: Arc<dyn ResourceMetrics>,
    pub(crate) config: ClientConfig,
}

impl<T: Transport> Core<T> {
    /// Issue one network call and classify its status.
    pub(crate) async fn dispatch(&self, request: Request, signature: &Signature) -> Result<Value> {
        let timer = Instant::now();
        let response = match self.transport.call(request).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_error(signature, &e);
                return Err(e);
            }
        };
        self.metrics.record_call(signature, timer.elapsed());

        if response.is_success() {
            info!(
                "✓ {} -> {} in {:?}",
                signature,
                response.status,
                timer.elapsed()
            );
            return Ok(response.data);
        }

        let error = Error::from_response(response.status, response.data, &self.config.validation_codes);
        warn!("✗ {} rejected: {}", signature, error);
        self.metrics.record_error(signature, &error);
        Err(error)
    }

    /// Merge a list of records into the entity cache, preserving order.
    pub(crate) fn merge_records(
        &self,
        def: &ResourceDefinition,
        records: Vec<Value>,
        mode: WriteMode,
    ) -> Result<Vec<EntityRef>> {
        records
            .into_iter()
            .map(|record| {
                let attributes = into_attributes(record, &def.name)?;
                self.entities.put(&def.name, &def.id_key, attributes, mode)
            })
            .collect()
    }

    /// Drop an entity from the cache and from every collection handle.
    pub(crate) fn forget(&self, resource: &str, id: &str) -> bool {
        let removed = self.entities.remove(resource, id).is_some();
        let touched = self.collections.purge(resource, id);
        removed || touched > 0
    }
}

/// Explicit, injectable registry of resources.
///
/// Resource names are unique per registry. Cloning is cheap and every clone
/// shares the same caches.
///
/// # Example
///
/// ```
/// use resource_kit::{ClientConfig, Registry, ResourceDefinition};
/// use resource_kit::transport::StubTransport;
///
/// let registry = Registry::new(StubTransport::new(), ClientConfig::default());
/// let users = registry.define_resource(ResourceDefinition::new("user")).unwrap();
///
/// assert_eq!(users.name(), "user");
/// assert!(registry.define_resource(ResourceDefinition::new("user")).is_err());
/// ```
#[derive(Clone)]
pub struct Registry<T: Transport> {
    core: Arc<Core<T>>,
    resources: Arc<DashMap<String, Resource<T>>>,
}

impl<T: Transport> Registry<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Registry::with_metrics(transport, config, Arc::new(NoOpMetrics))
    }

    /// Create a registry reporting to custom metrics.
    pub fn with_metrics(
        transport: T,
        config: ClientConfig,
        metrics: Arc<dyn ResourceMetrics>,
    ) -> Self {
        let core = Core {
            transport,
            urls: UrlBuilder::new(config.base_path.clone()),
            entities: EntityCache::new(),
            collections: CollectionStore::new(),
            fetches: InFlightTracker::new(),
            listings: InFlightTracker::new(),
            writes: InFlightTracker::new(),
            removals: InFlightTracker::new(),
            actions: InFlightTracker::new(),
            metrics,
            config,
        };
        Registry {
            core: Arc::new(core),
            resources: Arc::new(DashMap::new()),
        }
    }

    /// Register a resource.
    ///
    /// # Errors
    /// - `Error::DuplicateResource` if the name is taken
    /// - `Error::ConfigError` if the definition is inconsistent
    pub fn define_resource(&self, definition: ResourceDefinition) -> Result<Resource<T>> {
        definition.validate()?;
        match self.resources.entry(definition.name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateResource(definition.name)),
            Entry::Vacant(entry) => {
                let resource = Resource::new(definition, Arc::clone(&self.core));
                info!("✓ Resource defined: {}", resource.name());
                entry.insert(resource.clone());
                Ok(resource)
            }
        }
    }

    /// Look up a registered resource.
    pub fn resource(&self, name: &str) -> Result<Resource<T>> {
        self.resources
            .get(name)
            .map(|resource| resource.value().clone())
            .ok_or_else(|| Error::UnknownResource(name.to_string()))
    }

    /// Names of all registered resources, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn entities(&self) -> &EntityCache {
        &self.core.entities
    }

    pub fn collections(&self) -> &CollectionStore {
        &self.core.collections
    }

    pub fn config(&self) -> &ClientConfig {
        &self.core.config
    }

    pub fn transport(&self) -> &T {
        &self.core.transport
    }

    /// Drop every cached entity and collection handle.
    pub fn clear_cache(&self) {
        self.core.entities.clear();
        self.core.collections.clear();
    }

    /// [`guard`](crate::guard::guard) reporting discards to this registry's metrics.
    pub async fn guard<Fut, V, E, R, S, F, Out>(
        &self,
        future: Fut,
        relevance: R,
        on_success: S,
        on_failure: F,
    ) -> Guarded<Out>
    where
        Fut: Future<Output = std::result::Result<V, E>>,
        R: Relevance,
        S: FnOnce(V) -> Out,
        F: FnOnce(E) -> Out,
    {
        guard_with_metrics(future, relevance, self.core.metrics.as_ref(), on_success, on_failure)
            .await
    }
}
