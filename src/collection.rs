//! Collection handles: ordered id lists pointing into the entity cache.
//!
//! A handle never holds entity copies, so a model view and a collection view
//! of the same record cannot diverge.

use crate::key::{CacheKey, Params};
use dashmap::DashMap;

/// Positional result of one collection query.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionHandle {
    pub resource: String,
    pub params: Params,
    pub ids: Vec<String>,
    pub total_count: Option<u64>,
    /// True once a fetch has populated this handle.
    pub synced: bool,
}

impl CollectionHandle {
    fn empty(key: &CacheKey, params: &Params) -> Self {
        CollectionHandle {
            resource: key.resource().to_string(),
            params: params.clone(),
            ids: Vec::new(),
            total_count: None,
            synced: false,
        }
    }
}

/// Store of collection handles keyed by collection [`CacheKey`].
#[derive(Default)]
pub struct CollectionStore {
    handles: DashMap<CacheKey, CollectionHandle>,
}

impl CollectionStore {
    pub fn new() -> Self {
        CollectionStore {
            handles: DashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CollectionHandle> {
        self.handles.get(key).map(|handle| handle.value().clone())
    }

    pub fn ids(&self, key: &CacheKey) -> Vec<String> {
        self.handles
            .get(key)
            .map(|handle| handle.ids.clone())
            .unwrap_or_default()
    }

    pub fn is_synced(&self, key: &CacheKey) -> bool {
        self.handles.get(key).is_some_and(|handle| handle.synced)
    }

    /// Replace the id sequence with a fresh server result, order preserved.
    pub fn replace(&self, key: &CacheKey, params: &Params, ids: Vec<String>, total: Option<u64>) {
        let count = ids.len();
        let mut handle = self
            .handles
            .entry(key.clone())
            .or_insert_with(|| CollectionHandle::empty(key, params));
        handle.ids = ids;
        handle.total_count = total;
        handle.synced = true;
        debug!("✓ Collection REPLACE {} ({} ids)", key, count);
    }

    /// Append an id locally. No-op if already present.
    pub fn append(&self, key: &CacheKey, params: &Params, id: &str) {
        let mut handle = self
            .handles
            .entry(key.clone())
            .or_insert_with(|| CollectionHandle::empty(key, params));
        if !handle.ids.iter().any(|existing| existing == id) {
            handle.ids.push(id.to_string());
        }
    }

    /// Drop an id from one handle. Returns true if it was present.
    pub fn remove_id(&self, key: &CacheKey, id: &str) -> bool {
        match self.handles.get_mut(key) {
            Some(mut handle) => {
                let before = handle.ids.len();
                handle.ids.retain(|existing| existing != id);
                handle.ids.len() != before
            }
            None => false,
        }
    }

    /// Drop an id from every handle of `resource`. Returns how many handles changed.
    pub fn purge(&self, resource: &str, id: &str) -> usize {
        let mut touched = 0;
        for mut handle in self.handles.iter_mut() {
            if handle.resource != resource {
                continue;
            }
            let before = handle.ids.len();
            handle.ids.retain(|existing| existing != id);
            if handle.ids.len() != before {
                touched += 1;
            }
        }
        if touched > 0 {
            debug!("✓ Collection PURGE {}:{} from {} handles", resource, id, touched);
        }
        touched
    }

    /// Mark every handle of `resource` stale so the next read refetches it.
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        let mut touched = 0;
        for mut handle in self.handles.iter_mut() {
            if handle.resource == resource && handle.synced {
                handle.synced = false;
                touched += 1;
            }
        }
        touched
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CollectionHandle> {
        self.handles.remove(key).map(|(_, handle)| handle)
    }

    pub fn clear_resource(&self, resource: &str) {
        self.handles.retain(|key, _| key.resource() != resource);
    }

    pub fn clear(&self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
