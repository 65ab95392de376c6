//! URL construction from resource definitions.
//!
//! Path templates use `:name` for a required segment and `:name?` for an
//! optional one. An optional segment with no value is elided, so
//! `/:facility_id?/classes` becomes `/classes` without a facility and
//! `/7/classes` with one.

use crate::definition::{OperationScope, ResourceDefinition, DETAIL, LIST};
use crate::error::{Error, Result};
use crate::key::{param_text, Params};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, optional: bool },
}

/// A parsed path template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl PathTemplate {
    /// Parse a template such as `/:channel_id/contentnodes/`.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for raw in template.split('/').filter(|s| !s.is_empty()) {
            let segment = match raw.strip_prefix(':') {
                Some(param) => {
                    let (name, optional) = match param.strip_suffix('?') {
                        Some(name) => (name, true),
                        None => (param, false),
                    };
                    if name.is_empty() {
                        return Err(Error::ConfigError(format!(
                            "empty placeholder in path template {}",
                            template
                        )));
                    }
                    Segment::Param {
                        name: name.to_string(),
                        optional,
                    }
                }
                None => Segment::Literal(raw.to_string()),
            };
            segments.push(segment);
        }

        Ok(PathTemplate {
            segments,
            trailing_slash: template.ends_with('/'),
        })
    }

    /// Names of all placeholders, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn is_optional(&self, name: &str) -> bool {
        self.segments.iter().any(|segment| {
            matches!(segment, Segment::Param { name: n, optional: true } if n == name)
        })
    }

    /// Substitute `params` into the template.
    ///
    /// Returns the path and the names of the params it consumed. A missing
    /// required placeholder is reported with its name; the caller attaches the
    /// resource.
    fn compile(&self, params: &Params) -> std::result::Result<(String, BTreeSet<String>), String> {
        let mut parts = Vec::with_capacity(self.segments.len());
        let mut consumed = BTreeSet::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => parts.push(text.clone()),
                Segment::Param { name, optional } => {
                    consumed.insert(name.clone());
                    match params.get(name).and_then(param_text) {
                        Some(value) if !value.is_empty() => parts.push(encode_segment(&value)),
                        _ if *optional => {}
                        _ => return Err(name.clone()),
                    }
                }
            }
        }

        let mut path = format!("/{}", parts.join("/"));
        if self.trailing_slash && !parts.is_empty() {
            path.push('/');
        }
        Ok((path, consumed))
    }
}

/// Percent-encode one path segment.
///
/// `byte_serialize` writes a space as `+` and a literal `+` as `%2B`, so every
/// remaining `+` was a space and becomes `%20`.
fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// A built endpoint: path plus the params that did not land in the path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

/// Resolves endpoint paths for resource operations.
///
/// Endpoint convention:
/// - list: `<base>/<name>/`
/// - detail: `<base>/<name>/<id>/`
/// - list-scoped action: `<base>/<name>/<action>/`
/// - detail-scoped action: `<base>/<name>/<id>/<action>/`
///
/// # Example
///
/// ```
/// use resource_kit::{Params, ResourceDefinition, UrlBuilder};
/// use serde_json::json;
///
/// let urls = UrlBuilder::new("");
/// let def = ResourceDefinition::new("classroom")
///     .optional_identifier("facility_id")
///     .path("/:facility_id?/classes");
///
/// let mut params = Params::new();
/// assert_eq!(urls.build_url(&def, "list", None, &params).unwrap(), "/classes");
///
/// params.insert("facility_id".into(), json!(7));
/// assert_eq!(urls.build_url(&def, "list", None, &params).unwrap(), "/7/classes");
/// ```
#[derive(Clone, Debug, Default)]
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        UrlBuilder {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Build the endpoint for `operation` (`"list"`, `"detail"` or a custom name).
    ///
    /// # Errors
    /// - `Error::MissingIdentifier` if a required identifier has no value, or a
    ///   detail-scoped operation has no id (or an empty one)
    /// - `Error::UnknownOperation` for an undeclared custom operation
    pub fn build(
        &self,
        def: &ResourceDefinition,
        operation: &str,
        id: Option<&str>,
        params: &Params,
    ) -> Result<Endpoint> {
        let (scope, action) = match operation {
            LIST => (OperationScope::List, None),
            DETAIL => (OperationScope::Detail, None),
            custom => {
                let op = def
                    .operations
                    .get(custom)
                    .ok_or_else(|| Error::UnknownOperation {
                        resource: def.name.clone(),
                        operation: custom.to_string(),
                    })?;
                (op.scope, Some(custom))
            }
        };

        def.check_identifiers(params)?;
        let template = def.template()?;
        let (collection_path, consumed) =
            template
                .compile(params)
                .map_err(|identifier| Error::MissingIdentifier {
                    resource: def.name.clone(),
                    identifier,
                })?;

        let mut path = format!("{}{}", self.base, collection_path);
        if scope == OperationScope::Detail {
            let id = id.filter(|id| !id.is_empty()).ok_or_else(|| Error::MissingIdentifier {
                resource: def.name.clone(),
                identifier: def.id_key.clone(),
            })?;
            push_segment(&mut path, &encode_segment(id));
        }
        if let Some(action) = action {
            push_segment(&mut path, action);
        }

        let query = params
            .iter()
            .filter(|(name, _)| !consumed.contains(*name))
            .filter_map(|(name, value)| param_text(value).map(|text| (name.clone(), text)))
            .collect();

        let endpoint = Endpoint { path, query };
        debug!("Built {} {} -> {}", def.name, operation, endpoint);
        Ok(endpoint)
    }

    /// [`build`](Self::build) rendered as a string.
    pub fn build_url(
        &self,
        def: &ResourceDefinition,
        operation: &str,
        id: Option<&str>,
        params: &Params,
    ) -> Result<String> {
        self.build(def, operation, id, params).map(|e| e.to_string())
    }
}

fn push_segment(path: &mut String, segment: &str) {
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(segment);
    path.push('/');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Operation;
    use crate::transport::Method;
    use serde_json::{json, Value};

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn classroom() -> ResourceDefinition {
        ResourceDefinition::new("classroom")
            .optional_identifier("facility_id")
            .path("/:facility_id?/classes")
    }

    #[test]
    fn test_default_convention() {
        let urls = UrlBuilder::new("/api/");
        let def = ResourceDefinition::new("user")
            .operation(Operation::list("bulk", Method::Post))
            .operation(Operation::detail("reset", Method::Post));
        let none = Params::new();

        assert_eq!(urls.build_url(&def, LIST, None, &none).unwrap(), "/api/user/");
        assert_eq!(urls.build_url(&def, DETAIL, Some("4"), &none).unwrap(), "/api/user/4/");
        assert_eq!(urls.build_url(&def, "bulk", None, &none).unwrap(), "/api/user/bulk/");
        assert_eq!(
            urls.build_url(&def, "reset", Some("4"), &none).unwrap(),
            "/api/user/4/reset/"
        );
    }

    #[test]
    fn test_optional_identifier_elided() {
        let urls = UrlBuilder::default();
        let def = classroom();

        assert_eq!(
            urls.build_url(&def, LIST, None, &params(&[("facility_id", json!(null))]))
                .unwrap(),
            "/classes"
        );
        assert_eq!(
            urls.build_url(&def, LIST, None, &params(&[("facility_id", json!(7))]))
                .unwrap(),
            "/7/classes"
        );
        assert_eq!(
            urls.build_url(&def, DETAIL, Some("3"), &params(&[("facility_id", json!(7))]))
                .unwrap(),
            "/7/classes/3/"
        );
    }

    #[test]
    fn test_required_identifier_missing() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("contentnode")
            .identifier("channel_id")
            .path("/:channel_id/contentnodes/");

        let err = urls.build(&def, LIST, None, &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingIdentifier { ref identifier, .. } if identifier == "channel_id"
        ));
    }

    #[test]
    fn test_non_path_params_become_query() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("contentnode")
            .identifier("channel_id")
            .path("/:channel_id/contentnodes/");

        let endpoint = urls
            .build(
                &def,
                LIST,
                None,
                &params(&[
                    ("channel_id", json!("c1")),
                    ("kind", json!("video")),
                    ("ids", json!([1, 2])),
                    ("skip", json!(null)),
                ]),
            )
            .unwrap();

        assert_eq!(endpoint.path, "/c1/contentnodes/");
        assert_eq!(
            endpoint.query,
            vec![
                ("ids".to_string(), "1,2".to_string()),
                ("kind".to_string(), "video".to_string())
            ]
        );
        assert_eq!(endpoint.to_string(), "/c1/contentnodes/?ids=1%2C2&kind=video");
    }

    #[test]
    fn test_identifier_outside_template_goes_to_query() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("membership").identifier("user_id");

        let endpoint = urls
            .build(&def, LIST, None, &params(&[("user_id", json!(9))]))
            .unwrap();
        assert_eq!(endpoint.to_string(), "/membership/?user_id=9");
    }

    #[test]
    fn test_detail_requires_id() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("user");

        let err = urls.build(&def, DETAIL, None, &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingIdentifier { ref identifier, .. } if identifier == "id"
        ));
    }

    #[test]
    fn test_unknown_operation() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("user");

        let err = urls.build(&def, "explode", None, &Params::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownOperation { .. }));
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("file");

        assert_eq!(
            urls.build_url(&def, DETAIL, Some("a/b"), &Params::new()).unwrap(),
            "/file/a%2Fb/"
        );
    }

    #[test]
    fn test_path_segment_space_is_percent_encoded() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("file");

        assert_eq!(
            urls.build_url(&def, DETAIL, Some("a b+c"), &Params::new()).unwrap(),
            "/file/a%20b%2Bc/"
        );

        let def = ResourceDefinition::new("contentnode")
            .identifier("channel_id")
            .path("/:channel_id/contentnodes/");
        assert_eq!(
            urls.build_url(&def, LIST, None, &params(&[("channel_id", json!("my channel"))]))
                .unwrap(),
            "/my%20channel/contentnodes/"
        );
    }

    #[test]
    fn test_empty_id_is_missing() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("user");

        let err = urls.build(&def, DETAIL, Some(""), &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingIdentifier { ref identifier, .. } if identifier == "id"
        ));
    }

    #[test]
    fn test_empty_required_identifier_is_missing() {
        let urls = UrlBuilder::default();
        let def = ResourceDefinition::new("contentnode")
            .identifier("channel_id")
            .path("/:channel_id/contentnodes/");

        let err = urls
            .build(&def, LIST, None, &params(&[("channel_id", json!(""))]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingIdentifier { ref identifier, .. } if identifier == "channel_id"
        ));
    }

    #[test]
    fn test_template_parse_rejects_empty_placeholder() {
        assert!(PathTemplate::parse("/:/classes").is_err());
    }
}
