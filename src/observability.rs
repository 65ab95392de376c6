//! Observability hooks for the resource layer.
//!
//! Implement [`ResourceMetrics`] to feed a monitoring system:
//!
//! ```ignore
//! use resource_kit::observability::ResourceMetrics;
//! use resource_kit::key::Signature;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl ResourceMetrics for PrometheusMetrics {
//!     fn record_call(&self, signature: &Signature, duration: Duration) {
//!         // histogram!("resource_call_latency").record(duration);
//!     }
//! }
//!
//! // let registry = Registry::with_metrics(transport, config, Arc::new(PrometheusMetrics));
//! ```
//!
//! Unimplemented methods fall back to logging through the `log` crate.
//! [`NoOpMetrics`] is the registry default.

use crate::error::Error;
use crate::key::{CacheKey, Signature};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Hooks for the lifecycle events of resource operations.
pub trait ResourceMetrics: Send + Sync {
    /// A read was served from the entity cache.
    fn record_hit(&self, key: &CacheKey) {
        debug!("Resource HIT: {}", key);
    }

    /// A read found nothing cached.
    fn record_miss(&self, key: &CacheKey) {
        debug!("Resource MISS: {}", key);
    }

    /// A caller joined a call already in flight.
    fn record_collapsed(&self, signature: &Signature) {
        debug!("Resource COLLAPSED: {}", signature);
    }

    /// A network round trip completed (any status).
    fn record_call(&self, signature: &Signature, duration: Duration) {
        debug!("Resource CALL: {} took {:?}", signature, duration);
    }

    /// A call failed.
    fn record_error(&self, signature: &Signature, error: &Error) {
        warn!("Resource ERROR for {}: {}", signature, error);
    }

    /// A guarded result arrived after it stopped being relevant.
    fn record_discarded(&self) {
        debug!("Resource result DISCARDED (stale)");
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl ResourceMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &CacheKey) {}
    fn record_miss(&self, _key: &CacheKey) {}
    fn record_collapsed(&self, _signature: &Signature) {}
    fn record_call(&self, _signature: &Signature, _duration: Duration) {}
    fn record_error(&self, _signature: &Signature, _error: &Error) {}
    fn record_discarded(&self) {}
}

/// Point-in-time copy of [`CountingMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub calls: u64,
    pub collapsed: u64,
    pub errors: u64,
    pub discarded: u64,
}

/// Metrics that keep plain counters, handy in tests and debug endpoints.
#[derive(Default)]
pub struct CountingMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    calls: AtomicU64,
    collapsed: AtomicU64,
    errors: AtomicU64,
    discarded: AtomicU64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        CountingMetrics::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            calls: self.calls.load(Ordering::Relaxed),
            collapsed: self.collapsed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

impl ResourceMetrics for CountingMetrics {
    fn record_hit(&self, _key: &CacheKey) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _key: &CacheKey) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_collapsed(&self, _signature: &Signature) {
        self.collapsed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_call(&self, _signature: &Signature, _duration: Duration) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, signature: &Signature, error: &Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        debug!("Counted error for {}: {}", signature, error);
    }

    fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }
}
