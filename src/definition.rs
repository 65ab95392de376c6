//! Resource definitions: the configuration a resource is registered with.

use crate::endpoint::PathTemplate;
use crate::error::{Error, Result};
use crate::key::{param_text, Params};
use crate::transport::Method;
use std::collections::BTreeMap;

/// Name of the standard collection operation.
pub const LIST: &str = "list";

/// Name of the standard single-entity operation.
pub const DETAIL: &str = "detail";

/// A declared path/query parameter that disambiguates nested or filtered endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub optional: bool,
}

/// Whether a custom operation addresses the collection or one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationScope {
    /// `/<name>/<action>/`
    List,
    /// `/<name>/<id>/<action>/`
    Detail,
}

/// What a successful operation response does to the entity cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheEffect {
    /// Response is handed back untouched.
    #[default]
    None,
    /// Response is one record of this resource, merged into the cache.
    MergeEntity,
    /// Response is a list (or page) of records, each merged into the cache.
    MergeEntities,
}

/// A named custom operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub method: Method,
    pub scope: OperationScope,
    pub effect: CacheEffect,
    /// Send the body as a multipart form.
    pub multipart: bool,
}

impl Operation {
    /// Operation on the list endpoint.
    pub fn list(name: impl Into<String>, method: Method) -> Self {
        Operation {
            name: name.into(),
            method,
            scope: OperationScope::List,
            effect: CacheEffect::None,
            multipart: false,
        }
    }

    /// Operation on one entity's detail endpoint.
    pub fn detail(name: impl Into<String>, method: Method) -> Self {
        Operation {
            scope: OperationScope::Detail,
            ..Operation::list(name, method)
        }
    }

    pub fn with_effect(mut self, effect: CacheEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }
}

/// Immutable description of one server-side entity type.
///
/// # Example
///
/// ```
/// use resource_kit::{Operation, ResourceDefinition};
/// use resource_kit::transport::Method;
///
/// let classroom = ResourceDefinition::new("classroom")
///     .optional_identifier("facility_id")
///     .path("/:facility_id?/classes")
///     .operation(Operation::detail("copy", Method::Post));
///
/// assert_eq!(classroom.name, "classroom");
/// ```
#[derive(Clone, Debug)]
pub struct ResourceDefinition {
    pub name: String,
    pub id_key: String,
    pub identifiers: Vec<Identifier>,
    /// Collection path template. Defaults to `/<name>/`.
    pub path: Option<String>,
    pub operations: BTreeMap<String, Operation>,
}

impl ResourceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ResourceDefinition {
            name: name.into(),
            id_key: "id".to_string(),
            identifiers: Vec::new(),
            path: None,
            operations: BTreeMap::new(),
        }
    }

    pub fn id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    /// Declare a required identifier.
    pub fn identifier(mut self, name: impl Into<String>) -> Self {
        self.identifiers.push(Identifier {
            name: name.into(),
            optional: false,
        });
        self
    }

    /// Declare an identifier that may be omitted.
    pub fn optional_identifier(mut self, name: impl Into<String>) -> Self {
        self.identifiers.push(Identifier {
            name: name.into(),
            optional: true,
        });
        self
    }

    /// Collection path template, e.g. `/:facility_id?/classes`.
    pub fn path(mut self, template: impl Into<String>) -> Self {
        self.path = Some(template.into());
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.insert(operation.name.clone(), operation);
        self
    }

    /// The compiled collection path template.
    pub fn template(&self) -> Result<PathTemplate> {
        match &self.path {
            Some(template) => PathTemplate::parse(template),
            None => PathTemplate::parse(&format!("/{}/", self.name)),
        }
    }

    /// True if `name` is declared optional here or marked `?` in the template.
    pub fn is_optional(&self, name: &str, template: &PathTemplate) -> bool {
        self.identifiers
            .iter()
            .any(|identifier| identifier.name == name && identifier.optional)
            || template.is_optional(name)
    }

    /// Fail fast if a required identifier has no value in `params`.
    pub fn check_identifiers(&self, params: &Params) -> Result<()> {
        let template = self.template()?;
        for identifier in &self.identifiers {
            let present = params
                .get(&identifier.name)
                .and_then(param_text)
                .is_some_and(|text| !text.is_empty());
            if !present && !self.is_optional(&identifier.name, &template) {
                return Err(Error::MissingIdentifier {
                    resource: self.name.clone(),
                    identifier: identifier.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check the definition is internally consistent.
    ///
    /// # Errors
    /// `Error::ConfigError` for an empty name or id key, a template placeholder
    /// that is not a declared identifier, or a custom operation shadowing
    /// `list`/`detail`.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ConfigError("resource name is empty".to_string()));
        }
        if self.id_key.trim().is_empty() {
            return Err(Error::ConfigError(format!("{} has an empty id key", self.name)));
        }

        let template = self.template()?;
        for placeholder in template.placeholders() {
            if !self.identifiers.iter().any(|i| i.name == placeholder) {
                return Err(Error::ConfigError(format!(
                    "{} path uses undeclared identifier `{}`",
                    self.name, placeholder
                )));
            }
        }

        for name in self.operations.keys() {
            if name == LIST || name == DETAIL {
                return Err(Error::ConfigError(format!(
                    "{} redefines the standard `{}` operation",
                    self.name, name
                )));
            }
        }
        Ok(())
    }
}
