//! # resource-kit
//!
//! Identity-mapped resource cache for REST clients.
//!
//! ## Features
//!
//! - **Identity map:** one live [`Entity`] per `(resource, id)`; later fetches
//!   merge into it so every holder observes the update
//! - **Request collapsing:** concurrent equivalent requests share one network call
//! - **URL templating:** required and optional path identifiers (`/:facility_id?/classes`)
//! - **Live views:** [`Model`] and [`Collection`] read through the cache, never copies
//! - **Navigation guard:** drop results that settle after the user moved on
//! - **Transport agnostic:** bring any [`Transport`]; a scripted stub and a
//!   `reqwest` client (feature `http`) are included
//!
//! ## Quick Start
//!
//! ```
//! use resource_kit::{ClientConfig, ModelQuery, Registry, ResourceDefinition};
//! use resource_kit::transport::{Method, StubTransport};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> resource_kit::Result<()> {
//! let transport = StubTransport::new();
//! transport.respond(Method::Get, "/api/user/1/", json!({"id": 1, "name": "Ada"}));
//!
//! // 1. One registry per application, passed to whoever needs it
//! let registry = Registry::new(transport.clone(), ClientConfig::default().with_base_path("/api"));
//!
//! // 2. Define resources once
//! let users = registry.define_resource(ResourceDefinition::new("user"))?;
//!
//! // 3. Fetch; the second read is served from the cache
//! let first = users.fetch_model(ModelQuery::new("1")).await?;
//! let again = users.fetch_model(ModelQuery::new("1")).await?;
//!
//! assert!(Arc::ptr_eq(&first.entity().unwrap(), &again.entity().unwrap()));
//! assert_eq!(transport.call_count(), 1);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod cache;
pub mod collection;
pub mod config;
pub mod definition;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod guard;
pub mod inflight;
pub mod key;
pub mod observability;
pub mod registry;
pub mod resource;
pub mod strategy;
pub mod transport;
pub mod view;

// Re-exports for convenience
pub use cache::EntityCache;
pub use collection::{CollectionHandle, CollectionStore};
pub use config::ClientConfig;
pub use definition::{CacheEffect, Identifier, Operation, OperationScope, ResourceDefinition};
pub use endpoint::{Endpoint, PathTemplate, UrlBuilder};
pub use entity::{Attributes, Entity, EntityRef, WriteMode};
pub use error::{Error, FieldProblem, Result};
pub use guard::{guard, guard_with_metrics, Guarded, Navigation, NavigationToken, Relevance};
pub use key::{CacheKey, Params, Signature};
pub use observability::{CountingMetrics, NoOpMetrics, ResourceMetrics};
pub use registry::Registry;
pub use resource::{ActionCall, BoundOperation, CollectionQuery, ModelQuery, Resource, SaveModel};
pub use strategy::CacheStrategy;
pub use transport::{Method, Request, Response, Transport};
pub use view::{Collection, Model};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
