//! Navigation guard: drop results that arrive after they stopped mattering.
//!
//! Each navigation bumps a monotonic generation counter. An operation captures
//! a [`NavigationToken`] when it is dispatched; at settlement the token is
//! compared with the live counter and, if the user has moved on, the outcome
//! is discarded without running either continuation.
//!
//! The underlying call is never cancelled. It runs to completion and still
//! updates the shared caches; only the caller's continuation is skipped.

use crate::observability::ResourceMetrics;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic page-generation counter shared by the whole application.
#[derive(Clone, Debug, Default)]
pub struct Navigation {
    generation: Arc<AtomicU64>,
}

impl Navigation {
    pub fn new() -> Self {
        Navigation::default()
    }

    /// Record a navigation. Returns the new generation.
    pub fn navigate(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("» Navigation generation -> {}", generation);
        generation
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Capture the current generation.
    pub fn token(&self) -> NavigationToken {
        NavigationToken {
            captured: self.current(),
            generation: Arc::clone(&self.generation),
        }
    }
}

/// Generation captured at dispatch time.
#[derive(Clone, Debug)]
pub struct NavigationToken {
    captured: u64,
    generation: Arc<AtomicU64>,
}

impl NavigationToken {
    pub fn captured(&self) -> u64 {
        self.captured
    }

    /// True while no navigation happened since the token was taken.
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.captured
    }
}

/// Liveness check evaluated when a guarded future settles.
pub trait Relevance {
    fn is_relevant(&self) -> bool;
}

impl Relevance for NavigationToken {
    fn is_relevant(&self) -> bool {
        self.is_current()
    }
}

impl<F> Relevance for F
where
    F: Fn() -> bool,
{
    fn is_relevant(&self) -> bool {
        self()
    }
}

/// Outcome of a guarded future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// Still relevant; carries the continuation's output.
    Delivered(T),
    /// Settled after it stopped being relevant. Nothing ran.
    Discarded,
}

impl<T> Guarded<T> {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Guarded::Discarded)
    }

    pub fn delivered(self) -> Option<T> {
        match self {
            Guarded::Delivered(value) => Some(value),
            Guarded::Discarded => None,
        }
    }
}

/// Await `future`, then run exactly one of `on_success` / `on_failure`, but
/// only if `relevance` still holds at settlement.
///
/// # Example
///
/// ```
/// use resource_kit::guard::{guard, Guarded, Navigation};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let nav = Navigation::new();
/// let token = nav.token();
/// nav.navigate();
///
/// let outcome = guard(
///     async { Ok::<_, String>(5) },
///     token,
///     |v| v * 2,
///     |_e| 0,
/// )
/// .await;
/// assert_eq!(outcome, Guarded::Discarded);
/// # }
/// ```
pub async fn guard<Fut, T, E, R, S, F, Out>(
    future: Fut,
    relevance: R,
    on_success: S,
    on_failure: F,
) -> Guarded<Out>
where
    Fut: Future<Output = Result<T, E>>,
    R: Relevance,
    S: FnOnce(T) -> Out,
    F: FnOnce(E) -> Out,
{
    match resolve(future, relevance, None).await {
        Guarded::Delivered(Ok(value)) => Guarded::Delivered(on_success(value)),
        Guarded::Delivered(Err(error)) => Guarded::Delivered(on_failure(error)),
        Guarded::Discarded => Guarded::Discarded,
    }
}

/// [`guard`] that reports each discard to `metrics`.
pub async fn guard_with_metrics<Fut, T, E, R, S, F, Out>(
    future: Fut,
    relevance: R,
    metrics: &dyn ResourceMetrics,
    on_success: S,
    on_failure: F,
) -> Guarded<Out>
where
    Fut: Future<Output = Result<T, E>>,
    R: Relevance,
    S: FnOnce(T) -> Out,
    F: FnOnce(E) -> Out,
{
    match resolve(future, relevance, Some(metrics)).await {
        Guarded::Delivered(Ok(value)) => Guarded::Delivered(on_success(value)),
        Guarded::Delivered(Err(error)) => Guarded::Delivered(on_failure(error)),
        Guarded::Discarded => Guarded::Discarded,
    }
}

/// Await `future` and hand back its outcome only if `relevance` still holds.
pub async fn resolve_if_relevant<Fut, O, R>(future: Fut, relevance: R) -> Guarded<O>
where
    Fut: Future<Output = O>,
    R: Relevance,
{
    resolve(future, relevance, None).await
}

async fn resolve<Fut, O, R>(
    future: Fut,
    relevance: R,
    metrics: Option<&dyn ResourceMetrics>,
) -> Guarded<O>
where
    Fut: Future<Output = O>,
    R: Relevance,
{
    let outcome = future.await;
    if relevance.is_relevant() {
        return Guarded::Delivered(outcome);
    }
    debug!("✗ Result discarded (no longer relevant)");
    if let Some(metrics) = metrics {
        metrics.record_discarded();
    }
    Guarded::Discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CountingMetrics;
    use std::cell::Cell;
    use tokio::sync::oneshot;

    #[test]
    fn test_token_tracks_generation() {
        let nav = Navigation::new();
        let token = nav.token();
        assert!(token.is_current());

        assert_eq!(nav.navigate(), 1);
        assert!(!token.is_current());
        assert!(nav.token().is_current());
    }

    #[tokio::test]
    async fn test_relevant_result_runs_success() {
        let nav = Navigation::new();
        let outcome = guard(async { Ok::<_, String>(2) }, nav.token(), |v| v + 1, |_| 0).await;
        assert_eq!(outcome, Guarded::Delivered(3));
    }

    #[tokio::test]
    async fn test_relevant_failure_runs_failure() {
        let nav = Navigation::new();
        let outcome = guard(
            async { Err::<u8, _>("boom".to_string()) },
            nav.token(),
            |_| "ok".to_string(),
            |e| format!("failed: {}", e),
        )
        .await;
        assert_eq!(outcome, Guarded::Delivered("failed: boom".to_string()));
    }

    #[tokio::test]
    async fn test_navigation_during_flight_discards() {
        let nav = Navigation::new();
        let (tx, rx) = oneshot::channel::<u8>();
        let ran = Cell::new(false);

        let pending = guard(
            async move { rx.await.map_err(|e| e.to_string()) },
            nav.token(),
            |_| ran.set(true),
            |_| ran.set(true),
        );

        nav.navigate();
        tx.send(1).unwrap();

        assert!(pending.await.is_discarded());
        assert!(!ran.get());
    }

    #[tokio::test]
    async fn test_discards_are_counted() {
        let nav = Navigation::new();
        let metrics = CountingMetrics::new();

        let kept =
            guard_with_metrics(async { Ok::<_, String>(1) }, nav.token(), &metrics, |v| v, |_| 0)
                .await;
        assert_eq!(kept, Guarded::Delivered(1));
        assert_eq!(metrics.snapshot().discarded, 0);

        let token = nav.token();
        nav.navigate();
        let dropped =
            guard_with_metrics(async { Ok::<_, String>(1) }, token, &metrics, |v| v, |_| 0).await;
        assert!(dropped.is_discarded());
        assert_eq!(metrics.snapshot().discarded, 1);
    }

    #[tokio::test]
    async fn test_closure_relevance() {
        let live = Cell::new(true);
        let outcome = resolve_if_relevant(async { 4 }, || live.get()).await;
        assert_eq!(outcome.delivered(), Some(4));

        live.set(false);
        let outcome = resolve_if_relevant(async { 4 }, || live.get()).await;
        assert!(outcome.is_discarded());
    }
}
