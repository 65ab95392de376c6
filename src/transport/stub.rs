//! Scripted in-memory transport for tests.
//!
//! Plays the role a mock repository plays for a database-backed cache: tests
//! decide exactly what the "server" answers, count the calls that reached it,
//! and can hold responses back to simulate a slow network.

use super::{Method, Request, Response, Transport};
use crate::error::{Error, Result};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;

/// One scripted answer.
#[derive(Clone, Debug)]
pub enum Reply {
    Respond(Response),
    /// Fail without a response (`Error::Network`).
    Fail(String),
}

struct StubState {
    routes: DashMap<(Method, String), VecDeque<Reply>>,
    calls: Mutex<Vec<Request>>,
    gated: AtomicBool,
    gate: Semaphore,
}

impl Default for StubState {
    fn default() -> Self {
        StubState {
            routes: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }
}

/// Scripted transport.
///
/// Routes are keyed by method and path (the query string is ignored). Each
/// route holds a queue of replies; the last reply repeats once the queue is
/// down to one. Unknown routes answer `404`.
///
/// # Example
///
/// ```
/// use resource_kit::transport::{Method, StubTransport};
/// use serde_json::json;
///
/// let stub = StubTransport::new();
/// stub.respond(Method::Get, "/user/1/", json!({"id": 1, "name": "Alice"}));
/// assert_eq!(stub.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct StubTransport {
    state: Arc<StubState>,
}

impl StubTransport {
    pub fn new() -> Self {
        StubTransport::default()
    }

    /// Queue a `200` reply for a route.
    pub fn respond(&self, method: Method, path: &str, data: Value) {
        self.reply(method, path, Reply::Respond(Response::ok(data)));
    }

    /// Queue a reply with an explicit status.
    pub fn respond_with(&self, method: Method, path: &str, status: u16, data: Value) {
        self.reply(method, path, Reply::Respond(Response::new(status, data)));
    }

    /// Queue a transport failure for a route.
    pub fn fail(&self, method: Method, path: &str, message: &str) {
        self.reply(method, path, Reply::Fail(message.to_string()));
    }

    pub fn reply(&self, method: Method, path: &str, reply: Reply) {
        self.state
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Hold every subsequent call until [`release`](Self::release) lets it through.
    pub fn hold(&self) {
        self.state.gated.store(true, Ordering::SeqCst);
    }

    /// Let `count` held calls complete.
    pub fn release(&self, count: usize) {
        self.state.gate.add_permits(count);
    }

    /// Stop holding calls. Calls already waiting still need a permit.
    pub fn open(&self) {
        self.state.gated.store(false, Ordering::SeqCst);
    }

    /// Every request that reached the stub, in arrival order.
    pub fn calls(&self) -> Vec<Request> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of calls that reached `method path`.
    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn next_reply(&self, method: Method, path: &str) -> Reply {
        match self.state.routes.get_mut(&(method, path.to_string())) {
            Some(mut queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| not_found(path)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| not_found(path)),
            None => not_found(path),
        }
    }
}

fn not_found(path: &str) -> Reply {
    Reply::Respond(Response::new(
        404,
        json!({ "detail": format!("No route for {}", path) }),
    ))
}

impl Transport for StubTransport {
    async fn call(&self, request: Request) -> Result<Response> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if self.state.gated.load(Ordering::SeqCst) {
            match self.state.gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(Error::Network("stub gate closed".to_string())),
            }
        }

        match self.next_reply(request.method, &request.path) {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(Error::Network(message)),
        }
    }
}
