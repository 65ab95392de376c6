//! Live views onto cached state.
//!
//! Views hold ids, never entity copies. Every read goes back to the entity
//! cache, so a model view and a collection view of the same record always
//! agree.

use crate::entity::{into_attributes, Attributes, EntityRef, WriteMode};
use crate::error::{Error, Result};
use crate::key::{CacheKey, Params};
use crate::resource::{CollectionQuery, ModelQuery, Resource, SaveModel};
use crate::strategy::CacheStrategy;
use crate::transport::Transport;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Handle onto one entity of one resource.
#[derive(Clone)]
pub struct Model<T: Transport> {
    resource: Resource<T>,
    id: String,
    params: Params,
}

impl<T: Transport> Model<T> {
    pub(crate) fn new(resource: Resource<T>, id: String, params: Params) -> Self {
        Model {
            resource,
            id,
            params,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource(&self) -> &Resource<T> {
        &self.resource
    }

    /// The live cached entity, if any.
    pub fn entity(&self) -> Option<EntityRef> {
        self.resource.cached(&self.id)
    }

    pub fn attributes(&self) -> Option<Arc<Attributes>> {
        self.entity().map(|entity| entity.attributes())
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.entity().and_then(|entity| entity.get(field))
    }

    /// True while the entity is present in the cache.
    pub fn is_synced(&self) -> bool {
        self.entity().is_some()
    }

    pub async fn fetch(&self, strategy: CacheStrategy) -> Result<EntityRef> {
        let query = ModelQuery::new(self.id.clone())
            .params(self.params.clone())
            .strategy(strategy);
        self.resource.fetch_entity(query).await
    }

    /// PATCH `data` onto this entity.
    pub async fn save(&self, data: Value) -> Result<EntityRef> {
        let save = SaveModel::update(self.id.clone(), data).params(self.params.clone());
        let saved = self.resource.save_model(save).await?;
        saved
            .entity()
            .ok_or_else(|| Error::MalformedResponse(format!("{} vanished after save", self.id)))
    }

    pub async fn delete(&self) -> Result<()> {
        let query = ModelQuery::new(self.id.clone()).params(self.params.clone());
        self.resource.delete_model(query).await
    }
}

impl<T: Transport> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("resource", &self.resource.name())
            .field("id", &self.id)
            .finish()
    }
}

/// Handle onto the ordered result of one collection query.
#[derive(Clone)]
pub struct Collection<T: Transport> {
    resource: Resource<T>,
    params: Params,
    key: CacheKey,
}

impl<T: Transport> Collection<T> {
    pub(crate) fn new(resource: Resource<T>, params: Params, key: CacheKey) -> Self {
        Collection {
            resource,
            params,
            key,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Member ids in server order.
    pub fn ids(&self) -> Vec<String> {
        self.resource.core().collections.ids(&self.key)
    }

    /// Members that are still cached, in order.
    pub fn entities(&self) -> Vec<EntityRef> {
        self.ids()
            .iter()
            .filter_map(|id| self.resource.cached(id))
            .collect()
    }

    pub fn models(&self) -> Vec<Model<T>> {
        self.ids()
            .into_iter()
            .map(|id| Model::new(self.resource.clone(), id, self.params.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Server-side total (from a paginated response), if known.
    pub fn total_count(&self) -> Option<u64> {
        self.resource
            .core()
            .collections
            .get(&self.key)
            .and_then(|handle| handle.total_count)
    }

    pub fn is_synced(&self) -> bool {
        self.resource.core().collections.is_synced(&self.key)
    }

    pub async fn fetch(&self, strategy: CacheStrategy) -> Result<Vec<EntityRef>> {
        let query = CollectionQuery::new()
            .params(self.params.clone())
            .strategy(strategy);
        self.resource.fetch_collection_entities(query).await
    }

    /// Add a record locally: merge it into the cache and append its id.
    ///
    /// # Errors
    /// `Error::MalformedResponse` if `data` is not an object with an id.
    pub fn append(&self, data: Value) -> Result<EntityRef> {
        let def = self.resource.definition();
        let attributes = into_attributes(data, &def.name)?;
        let entity = self
            .resource
            .core()
            .entities
            .put(&def.name, &def.id_key, attributes, WriteMode::Merge)?;
        self.resource
            .core()
            .collections
            .append(&self.key, &self.params, entity.id());
        Ok(entity)
    }

    /// Drop an id from this collection only. The entity stays cached.
    pub fn remove(&self, id: &str) -> bool {
        self.resource.core().collections.remove_id(&self.key, id)
    }
}

impl<T: Transport> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("key", &self.key)
            .field("ids", &self.ids())
            .finish()
    }
}
