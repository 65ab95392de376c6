//! HTTP transport built on `reqwest`.
//!
//! Requires the `http` feature.

use super::{Method, Request, Response, Transport};
use crate::error::{Error, Result};
use reqwest::multipart::Form;
use serde_json::Value;
use url::Url;

/// Transport issuing real HTTP calls against one origin.
///
/// Bodies are JSON unless the request is flagged `multipart`, in which case
/// the top-level fields of the body become text parts of a form.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    origin: Url,
}

impl HttpTransport {
    /// Create a transport for `origin` (e.g. `https://example.org`).
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the origin is not a valid URL or the
    /// client cannot be built.
    pub fn new(origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| Error::ConfigError(format!("invalid origin {}: {}", origin, e)))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(HttpTransport { client, origin })
    }

    /// Use a preconfigured client (timeouts, TLS, proxies).
    pub fn with_client(client: reqwest::Client, origin: Url) -> Self {
        HttpTransport { client, origin }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn multipart_form(body: Value) -> Form {
    let mut form = Form::new();
    if let Value::Object(fields) = body {
        for (name, value) in fields {
            let text = match value {
                Value::String(s) => s,
                Value::Null => continue,
                other => other.to_string(),
            };
            form = form.text(name, text);
        }
    }
    form
}

impl Transport for HttpTransport {
    async fn call(&self, request: Request) -> Result<Response> {
        let url = self
            .origin
            .join(&request.path)
            .map_err(|e| Error::ConfigError(format!("invalid path {}: {}", request.path, e)))?;

        let mut builder = self
            .client
            .request(reqwest_method(request.method), url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.data {
            builder = if request.multipart {
                builder.multipart(multipart_form(body))
            } else {
                builder.json(&body)
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        info!("✓ HTTP {} {} -> {}", request.method, request.path, status);

        Ok(Response::new(status, data))
    }
}
