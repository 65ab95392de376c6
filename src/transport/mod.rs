//! Transport abstraction and implementations.
//!
//! The resource layer never speaks a protocol itself; it hands a [`Request`] to
//! an injected [`Transport`] and interprets the [`Response`].

use crate::error::Result;
use serde_json::Value;
use std::fmt;
use std::future::Future;

#[cfg(feature = "http")]
pub mod http;
pub mod secure;
pub mod stub;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use secure::{CookieJar, CookieSource, SecureTransport};
pub use stub::StubTransport;

/// HTTP verb of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    /// True for verbs that change server state and need the security token.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network call, as handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path relative to the transport's origin.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub data: Option<Value>,
    /// Send `data` as a multipart form instead of JSON.
    pub multipart: bool,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            query: Vec::new(),
            data: None,
            multipart: false,
            headers: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_multipart(mut self, multipart: bool) -> Self {
        self.multipart = multipart;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path plus encoded query string.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.path, query)
    }
}

/// Response as seen by the resource layer: status plus decoded body.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub data: Value,
}

impl Response {
    pub fn new(status: u16, data: Value) -> Self {
        Response { status, data }
    }

    pub fn ok(data: Value) -> Self {
        Response::new(200, data)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for transport implementations.
///
/// A transport resolves with `Ok(Response)` for every status the server
/// returned, including errors. `Err` is reserved for failures where no response
/// arrived (`Error::Network`).
///
/// Implementations: [`StubTransport`] (tests), [`SecureTransport`] (decorator),
/// `HttpTransport` (feature `http`).
pub trait Transport: Send + Sync + Clone + 'static {
    /// Perform one network call.
    fn call(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}
