//! In-memory transport for tests and offline use

use crate::client::Transport;
use crate::types::{ApiRequest, HttpMethod};
use iaso_core::{ApiError, ApiResult};
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct MockState {
    routes: HashMap<String, VecDeque<ApiResult<JsonValue>>>,
    calls: HashMap<String, usize>,
    requests: Vec<ApiRequest>,
}

/// Transport answering from canned responses keyed `METHOD:path`.
///
/// Responses queued for a route are consumed in order; the last one is
/// repeated once the queue is down to a single entry. Unknown routes answer
/// with a 404.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response for `method path`
    pub fn respond(&self, method: HttpMethod, path: &str, response: ApiResult<JsonValue>) {
        let key = format!("{}:{}", method.as_str(), path);
        debug!("Added mock response for {}", key);
        self.state
            .lock()
            .routes
            .entry(key)
            .or_default()
            .push_back(response);
    }

    /// Number of requests received for a `METHOD:path` route
    pub fn calls(&self, route: &str) -> usize {
        self.state.lock().calls.get(route).copied().unwrap_or(0)
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    fn next_response(&self, request: &ApiRequest) -> ApiResult<JsonValue> {
        let route = request.route();
        let mut state = self.state.lock();
        *state.calls.entry(route.clone()).or_insert(0) += 1;
        state.requests.push(request.clone());

        match state.routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Network("empty mock queue".into()))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ApiError::Network("empty mock queue".into()))),
            None => Err(ApiError::http(
                404,
                json!({"detail": format!("No mock for {}", route)}),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> ApiResult<JsonValue> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response(&request)
    }
}
