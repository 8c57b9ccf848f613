// src/fetch/mock.rs
use super::{FetchError, FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Scripted fetcher for tests and offline runs.
///
/// Routes are keyed by `FetchRequest::signature()`. A route holds a queue of
/// replies; the last reply repeats once the queue is drained. Unknown routes
/// fail like a refused connection.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, VecDeque<Result<(u16, String), FetchError>>>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, signature: &str, status: u16, body: impl Into<String>) -> &Self {
        self.push(signature, Ok((status, body.into())))
    }

    pub fn route_ok(&self, signature: &str, body: impl Into<String>) -> &Self {
        self.route(signature, 200, body)
    }

    pub fn route_json(&self, signature: &str, value: &serde_json::Value) -> &Self {
        self.route(signature, 200, value.to_string())
    }

    pub fn route_err(&self, signature: &str, err: FetchError) -> &Self {
        self.push(signature, Err(err))
    }

    fn push(&self, signature: &str, reply: Result<(u16, String), FetchError>) -> &Self {
        lock(&self.routes)
            .entry(signature.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Signatures of every request seen, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, signature: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.as_str() == signature)
            .count()
    }
}

// A panicking test must not poison the mock for the others.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poison| poison.into_inner())
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let sig = req.signature();
        lock(&self.calls).push(sig.clone());

        let reply = {
            let mut routes = lock(&self.routes);
            match routes.get_mut(&sig) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Ok((status, body))) => Ok(FetchResponse {
                status,
                final_url: req.url.clone(),
                body,
            }),
            Some(Err(e)) => Err(e),
            None => Err(FetchError::Transport(format!("connection refused: {sig}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_replies_then_last_repeats() {
        let m = MockFetcher::new();
        m.route("https://h/", 503, "")
            .route("https://h/", 200, "ok");
        let req = FetchRequest::get("https://h/");
        assert_eq!(m.fetch(&req).await.unwrap().status, 503);
        assert_eq!(m.fetch(&req).await.unwrap().status, 200);
        assert_eq!(m.fetch(&req).await.unwrap().status, 200);
        assert_eq!(m.calls_to("https://h/"), 3);
    }

    #[tokio::test]
    async fn unknown_route_is_transport_error() {
        let m = MockFetcher::new();
        let err = m.fetch(&FetchRequest::get("https://nowhere/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
