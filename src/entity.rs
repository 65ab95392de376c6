//! Reference-stable cached records.

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Field map of one record.
pub type Attributes = Map<String, Value>;

/// Shared handle onto a cached entity.
///
/// Every holder of the same `(resource, id)` holds the same `Arc`, so updates
/// written through the cache are observed everywhere. Compare handles with
/// [`Arc::ptr_eq`].
pub type EntityRef = Arc<Entity>;

/// How an incoming payload is written over a cached record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Shallow-overwrite fields present in the payload, keep the rest.
    #[default]
    Merge,

    /// Replace the whole field map. Only for callers that know the payload is
    /// a complete record.
    Replace,
}

/// One server-side record, mutable only by replacement of its field map.
pub struct Entity {
    id: String,
    fields: ArcSwap<Attributes>,
}

impl Entity {
    pub(crate) fn new(id: String, fields: Attributes) -> Self {
        Entity {
            id,
            fields: ArcSwap::from_pointee(fields),
        }
    }

    /// Canonical id of this record.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current snapshot of all fields.
    pub fn attributes(&self) -> Arc<Attributes> {
        self.fields.load_full()
    }

    /// Current value of one field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields.load().get(field).cloned()
    }

    /// The record as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(Attributes::clone(&self.fields.load()))
    }

    /// Write `payload` over the current fields.
    pub(crate) fn absorb(&self, payload: Attributes, mode: WriteMode) {
        match mode {
            WriteMode::Merge => {
                self.fields.rcu(|current| {
                    let mut next = Attributes::clone(current);
                    for (field, value) in &payload {
                        next.insert(field.clone(), value.clone());
                    }
                    next
                });
            }
            WriteMode::Replace => self.fields.store(Arc::new(payload)),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("fields", &self.attributes())
            .finish()
    }
}

/// Interpret a response body as a single record.
pub(crate) fn into_attributes(value: Value, context: &str) -> crate::Result<Attributes> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(crate::Error::MalformedResponse(format!(
            "{} expected an object, got {}",
            context, other
        ))),
    }
}
