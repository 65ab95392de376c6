//! Fetch strategies.
//!
//! An enum replaces the boolean `force` flag so every read states how it
//! treats the cache.
//!
//! ```
//! use resource_kit::strategy::CacheStrategy;
//!
//! // 1. Fresh - cache only
//! let _s = CacheStrategy::Fresh;
//!
//! // 2. Refresh - cache first, network on miss (default)
//! let _s = CacheStrategy::Refresh;
//!
//! // 3. Force - always call the server, merge the result
//! let _s = CacheStrategy::Force;
//! ```
//!
//! | Strategy | Cache Hit | Cache Miss | Collapses onto in-flight call |
//! |----------|-----------|------------|-------------------------------|
//! | **Fresh** | Return | `Error::CacheMiss` | n/a |
//! | **Refresh** | Return | Fetch | Yes |
//! | **Force** | Fetch | Fetch | No, but later callers join it |

/// How a read treats cached state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Cache only. A miss is an error, the server is never called.
    Fresh,

    /// Return the cached value if present, otherwise issue (or join) a fetch.
    #[default]
    Refresh,

    /// Always issue a new call. The response is written into the existing
    /// cached record, so held references observe it.
    Force,
}

impl CacheStrategy {
    /// Whether a cached value may satisfy the read.
    pub fn reads_cache(self) -> bool {
        !matches!(self, CacheStrategy::Force)
    }

    /// Whether the read may join a call already in flight.
    pub fn collapses(self) -> bool {
        !matches!(self, CacheStrategy::Force)
    }
}

impl From<bool> for CacheStrategy {
    /// Maps a `force` flag.
    fn from(force: bool) -> Self {
        if force {
            CacheStrategy::Force
        } else {
            CacheStrategy::Refresh
        }
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::Fresh => write!(f, "Fresh"),
            CacheStrategy::Refresh => write!(f, "Refresh"),
            CacheStrategy::Force => write!(f, "Force"),
        }
    }
}
