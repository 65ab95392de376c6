//! Security and cache-busting decoration for any transport.

use super::{Method, Request, Response, Transport};
use crate::config::ClientConfig;
use crate::error::Result;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of cookie values (the security token lives in one).
pub trait CookieSource: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

impl<F> CookieSource for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn cookie(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Mutable cookie store, updated when the session token rotates.
#[derive(Default)]
pub struct CookieJar {
    cookies: DashMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar {
            cookies: DashMap::new(),
        }
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.cookies.remove(name);
    }
}

impl CookieSource for CookieJar {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|value| value.value().clone())
    }
}

#[derive(Debug)]
struct SecuritySettings {
    csrf_cookie: String,
    csrf_header: String,
    cache_bust_param: String,
}

/// Transport decorator applying the two request rules every call obeys.
///
/// - GET requests get a unique cache-busting query parameter.
/// - Mutating requests carry the same-origin token header, read from a cookie.
///
/// # Example
///
/// ```
/// use resource_kit::transport::{CookieJar, SecureTransport, StubTransport};
/// use resource_kit::ClientConfig;
/// use std::sync::Arc;
///
/// let jar = Arc::new(CookieJar::new());
/// jar.set("csrftoken", "secret");
/// let transport = SecureTransport::new(StubTransport::new(), jar, &ClientConfig::default());
/// ```
#[derive(Clone)]
pub struct SecureTransport<T: Transport> {
    inner: T,
    cookies: Arc<dyn CookieSource>,
    settings: Arc<SecuritySettings>,
    sequence: Arc<AtomicU64>,
}

impl<T: Transport> SecureTransport<T> {
    pub fn new(inner: T, cookies: Arc<dyn CookieSource>, config: &ClientConfig) -> Self {
        SecureTransport {
            inner,
            cookies,
            settings: Arc::new(SecuritySettings {
                csrf_cookie: config.csrf_cookie.clone(),
                csrf_header: config.csrf_header.clone(),
                cache_bust_param: config.cache_bust_param.clone(),
            }),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn cache_bust_value(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}", millis, sequence % 10_000)
    }

    fn decorate(&self, mut request: Request) -> Request {
        if request.method == Method::Get {
            request
                .query
                .push((self.settings.cache_bust_param.clone(), self.cache_bust_value()));
        } else if let Some(token) = self.cookies.cookie(&self.settings.csrf_cookie) {
            request
                .headers
                .push((self.settings.csrf_header.clone(), token));
        } else {
            debug!(
                "No `{}` cookie; {} {} sent without security token",
                self.settings.csrf_cookie, request.method, request.path
            );
        }
        request
    }
}

impl<T: Transport> Transport for SecureTransport<T> {
    fn call(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        let request = self.decorate(request);
        self.inner.call(request)
    }
}
