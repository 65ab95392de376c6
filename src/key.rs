//! Cache keys and request signatures.

use crate::transport::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Request parameters, kept sorted so their serialization is canonical.
pub type Params = BTreeMap<String, Value>;

/// Render an id value the way it appears in keys and URLs.
///
/// Strings are taken verbatim, numbers and booleans use their JSON text.
/// `null`, arrays and objects are not valid ids.
pub fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Render a parameter value for a path segment or query string.
pub(crate) fn param_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(param_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// Sorted serialization of the parameters that disambiguate a request.
///
/// `null` values are dropped so that "absent" and "explicitly unset" agree.
pub(crate) fn canonical_params(params: &Params) -> String {
    let present: BTreeMap<&String, &Value> = params.iter().filter(|(_, v)| !v.is_null()).collect();
    serde_json::to_string(&present).unwrap_or_default()
}

/// Composite identity of one piece of logical data.
///
/// Two requests with the same `CacheKey` refer to the same data and are
/// deduplicated and merged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    resource: String,
    id: Option<String>,
    params: String,
}

impl CacheKey {
    /// Key for a single entity.
    pub fn entity(resource: &str, id: &str, params: &Params) -> Self {
        CacheKey {
            resource: resource.to_string(),
            id: Some(id.to_string()),
            params: canonical_params(params),
        }
    }

    /// Key for a collection query.
    pub fn collection(resource: &str, params: &Params) -> Self {
        CacheKey {
            resource: resource.to_string(),
            id: None,
            params: canonical_params(params),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.resource,
            self.id.as_deref().unwrap_or("*"),
            self.params
        )
    }
}

/// Identity of one network call: verb, operation and the data it touches.
///
/// Mutations also carry a canonical serialization of their body so that only
/// identical writes collapse.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    method: Method,
    operation: String,
    key: CacheKey,
    body: Option<String>,
}

impl Signature {
    pub fn new(method: Method, operation: &str, key: CacheKey) -> Self {
        Signature {
            method,
            operation: operation.to_string(),
            key,
            body: None,
        }
    }

    /// Attach the request body to the signature.
    pub fn with_body(mut self, body: Option<&Value>) -> Self {
        self.body = body.map(|b| serde_json::to_string(b).unwrap_or_default());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.operation, self.key)?;
        if let Some(body) = &self.body {
            write!(f, " #{}", body.len())?;
        }
        Ok(())
    }
}
