//! Entity cache: process-wide identity map of cached records.
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding, the same
//! way the in-memory store does elsewhere. Entries never expire; they leave
//! only through explicit removal.

use crate::entity::{Attributes, Entity, EntityRef, WriteMode};
use crate::error::{Error, Result};
use crate::key::canonical_id;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EntityKey {
    resource: String,
    id: String,
}

impl EntityKey {
    fn new(resource: &str, id: &str) -> Self {
        EntityKey {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

/// Identity map from `(resource, id)` to the single live [`Entity`].
///
/// # Example
///
/// ```
/// use resource_kit::{EntityCache, WriteMode};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let cache = EntityCache::new();
/// let first = cache
///     .put("user", "id", json!({"id": 1, "name": "a"}).as_object().unwrap().clone(), WriteMode::Merge)
///     .unwrap();
/// let second = cache
///     .put("user", "id", json!({"id": 1, "name": "b"}).as_object().unwrap().clone(), WriteMode::Merge)
///     .unwrap();
///
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(first.get("name"), Some(json!("b")));
/// ```
#[derive(Default)]
pub struct EntityCache {
    entries: DashMap<EntityKey, EntityRef>,
}

impl EntityCache {
    pub fn new() -> Self {
        EntityCache {
            entries: DashMap::new(),
        }
    }

    /// Look up the live entity for `(resource, id)`.
    pub fn get(&self, resource: &str, id: &str) -> Option<EntityRef> {
        self.entries
            .get(&EntityKey::new(resource, id))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Write a payload into the cache.
    ///
    /// Creates the entity if absent. If present, writes into the existing
    /// object so every holder observes the change.
    ///
    /// # Errors
    /// Returns `Error::MalformedResponse` if the payload has no usable id under `id_key`.
    pub fn put(
        &self,
        resource: &str,
        id_key: &str,
        payload: Attributes,
        mode: WriteMode,
    ) -> Result<EntityRef> {
        let id = payload
            .get(id_key)
            .and_then(canonical_id)
            .ok_or_else(|| {
                Error::MalformedResponse(format!(
                    "{} record without a usable `{}`",
                    resource, id_key
                ))
            })?;

        match self.entries.entry(EntityKey::new(resource, &id)) {
            Entry::Occupied(entry) => {
                entry.get().absorb(payload, mode);
                debug!("✓ Entity MERGE {}:{} ({:?})", resource, id, mode);
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let entity = Arc::new(Entity::new(id, payload));
                entry.insert(Arc::clone(&entity));
                debug!("✓ Entity INSERT {}:{}", resource, entity.id());
                Ok(entity)
            }
        }
    }

    /// Evict one entity. Existing handles keep their last snapshot.
    pub fn remove(&self, resource: &str, id: &str) -> Option<EntityRef> {
        let removed = self
            .entries
            .remove(&EntityKey::new(resource, id))
            .map(|(_, entity)| entity);
        if removed.is_some() {
            debug!("✓ Entity REMOVE {}:{}", resource, id);
        }
        removed
    }

    /// Evict every entity of one resource.
    pub fn clear_resource(&self, resource: &str) {
        self.entries.retain(|key, _| key.resource != resource);
        warn!("⚠ Entity cache cleared for {}", resource);
    }

    /// Evict everything.
    pub fn clear(&self) {
        self.entries.clear();
        warn!("⚠ Entity cache CLEAR_ALL executed");
    }

    /// Number of cached entities of one resource.
    pub fn count(&self, resource: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key().resource == resource)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
