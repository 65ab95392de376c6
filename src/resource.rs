//! Resources: CRUD and custom operations over the shared caches.
//!
//! Every network-path operation follows the same route:
//!
//! 1. Validate identifiers and build the endpoint (fails before any call)
//! 2. Compute the request [`Signature`]
//! 3. Join the in-flight call for that signature, or start one
//! 4. The started call classifies the response and writes the caches once
//!
//! Reads short-circuit on the cache before step 3 unless forced.

use crate::definition::{CacheEffect, Operation, OperationScope, ResourceDefinition, DETAIL, LIST};
use crate::entity::{into_attributes, EntityRef, WriteMode};
use crate::error::{Error, Result};
use crate::inflight::Joined;
use crate::key::{CacheKey, Params, Signature};
use crate::registry::Core;
use crate::strategy::CacheStrategy;
use crate::transport::{Method, Request, Transport};
use crate::view::{Collection, Model};
use serde_json::Value;
use std::sync::Arc;

/// Read of one entity.
///
/// # Example
///
/// ```
/// use resource_kit::ModelQuery;
///
/// let query = ModelQuery::new("42").param("facility_id", "f1").force();
/// assert_eq!(query.id(), "42");
/// ```
#[derive(Clone, Debug)]
pub struct ModelQuery {
    id: String,
    params: Params,
    strategy: CacheStrategy,
    mode: WriteMode,
}

impl ModelQuery {
    pub fn new(id: impl Into<String>) -> Self {
        ModelQuery {
            id: id.into(),
            params: Params::new(),
            strategy: CacheStrategy::default(),
            mode: WriteMode::default(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Skip the cache and issue a new call.
    pub fn force(self) -> Self {
        self.strategy(CacheStrategy::Force)
    }

    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Treat the response as a complete record and replace cached fields.
    pub fn replace(mut self) -> Self {
        self.mode = WriteMode::Replace;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Read of one collection.
#[derive(Clone, Debug, Default)]
pub struct CollectionQuery {
    params: Params,
    strategy: CacheStrategy,
}

impl CollectionQuery {
    pub fn new() -> Self {
        CollectionQuery::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    pub fn force(self) -> Self {
        self.strategy(CacheStrategy::Force)
    }

    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Create or update of one entity.
#[derive(Clone, Debug)]
pub struct SaveModel {
    id: Option<String>,
    data: Value,
    params: Params,
    exists: Option<bool>,
    multipart: bool,
    replace: bool,
}

impl SaveModel {
    /// POST a new record to the list endpoint.
    pub fn create(data: Value) -> Self {
        SaveModel {
            id: None,
            data,
            params: Params::new(),
            exists: None,
            multipart: false,
            replace: false,
        }
    }

    /// PATCH an existing record.
    pub fn update(id: impl Into<String>, data: Value) -> Self {
        SaveModel {
            id: Some(id.into()),
            ..SaveModel::create(data)
        }
    }

    /// Override whether the record already exists server-side.
    ///
    /// With `false` the record is created even if an id is known.
    pub fn exists(mut self, exists: bool) -> Self {
        self.exists = Some(exists);
        self
    }

    /// Send the body as a multipart form.
    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    /// Update with PUT and replace the cached record instead of merging.
    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    fn update_id(&self) -> Option<&str> {
        match self.exists {
            Some(false) => None,
            _ => self.id.as_deref(),
        }
    }
}

/// Arguments for a custom operation.
#[derive(Clone, Debug)]
pub struct ActionCall {
    id: Option<String>,
    params: Params,
    data: Option<Value>,
    collapse: bool,
}

impl Default for ActionCall {
    fn default() -> Self {
        ActionCall {
            id: None,
            params: Params::new(),
            data: None,
            collapse: true,
        }
    }
}

impl ActionCall {
    pub fn new() -> Self {
        ActionCall::default()
    }

    /// Target one entity (required by detail-scoped operations).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Issue a new call even if an identical one is in flight.
    pub fn force(mut self) -> Self {
        self.collapse = false;
        self
    }
}

/// Split a list response into records and a total count.
///
/// Accepts a bare array or a page object `{ "results": [...], "count": n }`.
fn page_records(data: Value, resource: &str) -> Result<(Vec<Value>, Option<u64>)> {
    match data {
        Value::Array(records) => {
            let total = records.len() as u64;
            Ok((records, Some(total)))
        }
        Value::Object(mut page) => match page.remove("results") {
            Some(Value::Array(records)) => {
                let total = page
                    .get("count")
                    .and_then(Value::as_u64)
                    .unwrap_or(records.len() as u64);
                Ok((records, Some(total)))
            }
            _ => Err(Error::MalformedResponse(format!(
                "{} list response is an object without `results`",
                resource
            ))),
        },
        other => Err(Error::MalformedResponse(format!(
            "{} list response is not a list: {}",
            resource, other
        ))),
    }
}

/// Handle onto one registered resource.
///
/// Cloning is cheap. All clones (and all resources of one registry) share the
/// same caches and in-flight trackers.
#[derive(Clone)]
pub struct Resource<T: Transport> {
    def: Arc<ResourceDefinition>,
    core: Arc<Core<T>>,
}

impl<T: Transport> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("def", &self.def).finish_non_exhaustive()
    }
}

impl<T: Transport> Resource<T> {
    pub(crate) fn new(def: ResourceDefinition, core: Arc<Core<T>>) -> Self {
        Resource {
            def: Arc::new(def),
            core,
        }
    }

    pub(crate) fn core(&self) -> &Core<T> {
        &self.core
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.def
    }

    /// Endpoint URL for `operation` (`"list"`, `"detail"` or a custom name).
    pub fn url(&self, operation: &str, id: Option<&str>, params: &Params) -> Result<String> {
        self.core.urls.build_url(&self.def, operation, id, params)
    }

    /// The cached entity for `id`, without any network call.
    pub fn cached(&self, id: &str) -> Option<EntityRef> {
        self.core.entities.get(&self.def.name, id)
    }

    /// Model view onto `id`. No network call.
    ///
    /// The view carries no params; use [`get_model_with`](Self::get_model_with)
    /// for resources whose path needs identifiers.
    pub fn get_model(&self, id: impl Into<String>) -> Model<T> {
        Model::new(self.clone(), id.into(), Params::new())
    }

    /// Model view onto `id` that sends `params` with every fetch, save and delete.
    ///
    /// # Errors
    /// `Error::MissingIdentifier` if a required identifier is absent.
    pub fn get_model_with(&self, id: impl Into<String>, params: Params) -> Result<Model<T>> {
        self.def.check_identifiers(&params)?;
        Ok(Model::new(self.clone(), id.into(), params))
    }

    /// Collection view onto `params`. No network call.
    ///
    /// # Errors
    /// `Error::MissingIdentifier` if a required identifier is absent.
    pub fn get_collection(&self, params: Params) -> Result<Collection<T>> {
        self.def.check_identifiers(&params)?;
        let key = CacheKey::collection(&self.def.name, &params);
        Ok(Collection::new(self.clone(), params, key))
    }

    /// Fetch one entity and return its model view.
    ///
    /// A cached entity is returned without suspending unless the query is forced.
    pub async fn fetch_model(&self, query: ModelQuery) -> Result<Model<T>> {
        let params = query.params.clone();
        let entity = self.fetch_entity(query).await?;
        Ok(Model::new(self.clone(), entity.id().to_string(), params))
    }

    pub(crate) async fn fetch_entity(&self, query: ModelQuery) -> Result<EntityRef> {
        self.def.check_identifiers(&query.params)?;
        let key = CacheKey::entity(&self.def.name, &query.id, &query.params);

        if query.strategy.reads_cache() {
            if let Some(entity) = self.cached(&query.id) {
                debug!("✓ Resource GET {} -> HIT", key);
                self.core.metrics.record_hit(&key);
                return Ok(entity);
            }
            debug!("Resource GET {} -> MISS", key);
            self.core.metrics.record_miss(&key);
            if query.strategy == CacheStrategy::Fresh {
                return Err(Error::CacheMiss);
            }
        }

        let endpoint = self
            .core
            .urls
            .build(&self.def, DETAIL, Some(&query.id), &query.params)?;
        let request = Request::new(Method::Get, endpoint.path).with_query(endpoint.query);
        let signature = Signature::new(Method::Get, DETAIL, key);
        let mode = query.mode;

        let core = Arc::clone(&self.core);
        let def = Arc::clone(&self.def);
        let sig = signature.clone();
        let joined = self
            .core
            .fetches
            .run(signature.clone(), query.strategy.collapses(), async move {
                let data = core.dispatch(request, &sig).await?;
                let attributes = into_attributes(data, &def.name)?;
                core.entities.put(&def.name, &def.id_key, attributes, mode)
            });
        self.settle(joined, &signature).await
    }

    /// Fetch a collection and return its view.
    ///
    /// On success the handle's id list is replaced by the server's, in
    /// server order. Each record is merged into the entity cache.
    pub async fn fetch_collection(&self, query: CollectionQuery) -> Result<Collection<T>> {
        let collection = self.get_collection(query.params.clone())?;
        self.fetch_collection_entities(query).await?;
        Ok(collection)
    }

    pub(crate) async fn fetch_collection_entities(
        &self,
        query: CollectionQuery,
    ) -> Result<Vec<EntityRef>> {
        self.def.check_identifiers(&query.params)?;
        let key = CacheKey::collection(&self.def.name, &query.params);

        if query.strategy.reads_cache() {
            if let Some(handle) = self.core.collections.get(&key).filter(|h| h.synced) {
                debug!("✓ Resource LIST {} -> HIT", key);
                self.core.metrics.record_hit(&key);
                return Ok(handle
                    .ids
                    .iter()
                    .filter_map(|id| self.cached(id))
                    .collect());
            }
            debug!("Resource LIST {} -> MISS", key);
            self.core.metrics.record_miss(&key);
            if query.strategy == CacheStrategy::Fresh {
                return Err(Error::CacheMiss);
            }
        }

        let endpoint = self.core.urls.build(&self.def, LIST, None, &query.params)?;
        let request = Request::new(Method::Get, endpoint.path).with_query(endpoint.query);
        let signature = Signature::new(Method::Get, LIST, key.clone());

        let core = Arc::clone(&self.core);
        let def = Arc::clone(&self.def);
        let sig = signature.clone();
        let params = query.params;
        let joined = self
            .core
            .listings
            .run(signature.clone(), query.strategy.collapses(), async move {
                let data = core.dispatch(request, &sig).await?;
                let (records, total) = page_records(data, &def.name)?;
                let entities = core.merge_records(&def, records, WriteMode::Merge)?;
                let ids = entities.iter().map(|e| e.id().to_string()).collect();
                core.collections.replace(&key, &params, ids, total);
                Ok(entities)
            });
        self.settle(joined, &signature).await
    }

    /// Create or update one entity.
    ///
    /// The cache is written from the response, so server-computed fields
    /// are reflected. A create also marks this resource's collections stale.
    pub async fn save_model(&self, save: SaveModel) -> Result<Model<T>> {
        self.def.check_identifiers(&save.params)?;

        let (method, operation, endpoint, key) = match save.update_id() {
            Some(id) => (
                if save.replace { Method::Put } else { Method::Patch },
                DETAIL,
                self.core.urls.build(&self.def, DETAIL, Some(id), &save.params)?,
                CacheKey::entity(&self.def.name, id, &save.params),
            ),
            None => (
                Method::Post,
                LIST,
                self.core.urls.build(&self.def, LIST, None, &save.params)?,
                CacheKey::collection(&self.def.name, &save.params),
            ),
        };
        let signature = Signature::new(method, operation, key).with_body(Some(&save.data));
        let request = Request::new(method, endpoint.path)
            .with_query(endpoint.query)
            .with_data(save.data)
            .with_multipart(save.multipart);
        let mode = if save.replace {
            WriteMode::Replace
        } else {
            WriteMode::Merge
        };

        let core = Arc::clone(&self.core);
        let def = Arc::clone(&self.def);
        let sig = signature.clone();
        let joined = self.core.writes.run(signature.clone(), true, async move {
            let data = core.dispatch(request, &sig).await?;
            let attributes = into_attributes(data, &def.name)?;
            let entity = core.entities.put(&def.name, &def.id_key, attributes, mode)?;
            if method == Method::Post {
                core.collections.invalidate_resource(&def.name);
            }
            Ok(entity)
        });
        let entity = self.settle(joined, &signature).await?;
        Ok(Model::new(self.clone(), entity.id().to_string(), save.params))
    }

    /// Create a record; `multipart` selects form encoding.
    pub async fn create(&self, data: Value, multipart: bool) -> Result<Model<T>> {
        let save = SaveModel::create(data);
        let save = if multipart { save.multipart() } else { save };
        self.save_model(save).await
    }

    /// Delete one entity server-side, then drop it from the entity cache and
    /// from every collection handle of this resource.
    pub async fn delete_model(&self, query: ModelQuery) -> Result<()> {
        self.def.check_identifiers(&query.params)?;
        let endpoint = self
            .core
            .urls
            .build(&self.def, DETAIL, Some(&query.id), &query.params)?;
        let request = Request::new(Method::Delete, endpoint.path).with_query(endpoint.query);
        let key = CacheKey::entity(&self.def.name, &query.id, &query.params);
        let signature = Signature::new(Method::Delete, DETAIL, key);

        let core = Arc::clone(&self.core);
        let def = Arc::clone(&self.def);
        let sig = signature.clone();
        let id = query.id;
        let joined = self.core.removals.run(signature.clone(), true, async move {
            core.dispatch(request, &sig).await?;
            core.forget(&def.name, &id);
            Ok(())
        });
        self.settle(joined, &signature).await
    }

    /// Bulk create: POST a list of records to the list endpoint.
    ///
    /// The returned records are merged and become the contents of the
    /// collection handle for `params`.
    pub async fn save_collection(&self, params: Params, data: Vec<Value>) -> Result<Collection<T>> {
        let collection = self.get_collection(params.clone())?;
        let endpoint = self.core.urls.build(&self.def, LIST, None, &params)?;
        let body = Value::Array(data);
        let key = collection.key().clone();
        let signature = Signature::new(Method::Post, LIST, key.clone()).with_body(Some(&body));
        let request = Request::new(Method::Post, endpoint.path)
            .with_query(endpoint.query)
            .with_data(body);

        let core = Arc::clone(&self.core);
        let def = Arc::clone(&self.def);
        let sig = signature.clone();
        let joined = self.core.listings.run(signature.clone(), true, async move {
            let data = core.dispatch(request, &sig).await?;
            let (records, total) = page_records(data, &def.name)?;
            let entities = core.merge_records(&def, records, WriteMode::Merge)?;
            let ids = entities.iter().map(|e| e.id().to_string()).collect();
            core.collections.replace(&key, &params, ids, total);
            Ok(entities)
        });
        self.settle(joined, &signature).await?;
        Ok(collection)
    }

    /// DELETE on the list endpoint with `params` as filters.
    ///
    /// Drops every member of the matching handle from the caches, then the
    /// handle itself.
    pub async fn delete_collection(&self, params: Params) -> Result<()> {
        self.def.check_identifiers(&params)?;
        let endpoint = self.core.urls.build(&self.def, LIST, None, &params)?;
        let key = CacheKey::collection(&self.def.name, &params);
        let request = Request::new(Method::Delete, endpoint.path).with_query(endpoint.query);
        let signature = Signature::new(Method::Delete, LIST, key.clone());

        let core = Arc::clone(&self.core);
        let def = Arc::clone(&self.def);
        let sig = signature.clone();
        let joined = self.core.removals.run(signature.clone(), true, async move {
            core.dispatch(request, &sig).await?;
            if let Some(handle) = core.collections.remove(&key) {
                for id in &handle.ids {
                    core.forget(&def.name, id);
                }
            }
            Ok(())
        });
        self.settle(joined, &signature).await
    }

    /// Run a custom operation by name.
    ///
    /// Identical concurrent calls (same method, target, params and body)
    /// collapse into one request. The response feeds the entity cache as the
    /// operation's [`CacheEffect`] says, and is returned untouched.
    pub async fn invoke(&self, name: &str, call: ActionCall) -> Result<Value> {
        let op = self.lookup(name)?.clone();
        let endpoint = self
            .core
            .urls
            .build(&self.def, name, call.id.as_deref(), &call.params)?;
        let key = match (&call.id, op.scope) {
            (Some(id), OperationScope::Detail) => CacheKey::entity(&self.def.name, id, &call.params),
            _ => CacheKey::collection(&self.def.name, &call.params),
        };
        let signature = Signature::new(op.method, name, key).with_body(call.data.as_ref());

        let mut request = Request::new(op.method, endpoint.path)
            .with_query(endpoint.query)
            .with_multipart(op.multipart);
        if let Some(data) = call.data {
            request = request.with_data(data);
        }

        let core = Arc::clone(&self.core);
        let def = Arc::clone(&self.def);
        let sig = signature.clone();
        let joined = self
            .core
            .actions
            .run(signature.clone(), call.collapse, async move {
                let data = core.dispatch(request, &sig).await?;
                match op.effect {
                    CacheEffect::None => {}
                    CacheEffect::MergeEntity => {
                        let attributes = into_attributes(data.clone(), &def.name)?;
                        core.entities
                            .put(&def.name, &def.id_key, attributes, WriteMode::Merge)?;
                    }
                    CacheEffect::MergeEntities => {
                        let (records, _) = page_records(data.clone(), &def.name)?;
                        core.merge_records(&def, records, WriteMode::Merge)?;
                    }
                }
                Ok(data)
            });
        self.settle(joined, &signature).await
    }

    /// A custom operation bound to this resource, checked up front.
    ///
    /// # Errors
    /// `Error::UnknownOperation` if the definition has no such operation.
    pub fn operation(&self, name: &str) -> Result<BoundOperation<T>> {
        let operation = self.lookup(name)?.clone();
        Ok(BoundOperation {
            resource: self.clone(),
            operation,
        })
    }

    /// Drop one entity from the caches without a network call.
    pub fn uncache_model(&self, id: &str) -> bool {
        self.core.forget(&self.def.name, id)
    }

    /// Drop one collection handle. Its member entities stay cached.
    pub fn uncache_collection(&self, params: &Params) -> bool {
        let key = CacheKey::collection(&self.def.name, params);
        self.core.collections.remove(&key).is_some()
    }

    /// Drop every cached entity and handle of this resource.
    pub fn clear_cache(&self) {
        self.core.entities.clear_resource(&self.def.name);
        self.core.collections.clear_resource(&self.def.name);
    }

    fn lookup(&self, name: &str) -> Result<&Operation> {
        self.def
            .operations
            .get(name)
            .ok_or_else(|| Error::UnknownOperation {
                resource: self.def.name.clone(),
                operation: name.to_string(),
            })
    }

    async fn settle<V>(&self, joined: Joined<V>, signature: &Signature) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        if joined.collapsed {
            self.core.metrics.record_collapsed(signature);
        }
        joined.future.await
    }
}

/// A custom operation with its resource bound.
#[derive(Clone)]
pub struct BoundOperation<T: Transport> {
    resource: Resource<T>,
    operation: Operation,
}

impl<T: Transport> BoundOperation<T> {
    pub fn name(&self) -> &str {
        &self.operation.name
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn url(&self, id: Option<&str>, params: &Params) -> Result<String> {
        self.resource.url(&self.operation.name, id, params)
    }

    pub async fn call(&self, call: ActionCall) -> Result<Value> {
        self.resource.invoke(&self.operation.name, call).await
    }
}
