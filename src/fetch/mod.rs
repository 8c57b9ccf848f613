// src/fetch/mod.rs
//! Network seam. Every remote call in the pipeline goes through `Fetcher`,
//! so discovery and extraction can be exercised against `MockFetcher`.

pub mod http;
pub mod mock;

pub use http::HttpFetcher;
pub use mock::MockFetcher;

use crate::gate::Gate;
use async_trait::async_trait;
use serde_json::Value;

/// GET request: target URL plus query parameters kept apart from the URL,
/// so a request has a stable signature for the pagination loop guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// `url` + sorted params. Two requests with equal signatures fetch the same thing.
    pub fn signature(&self) -> String {
        if self.params.is_empty() {
            return self.url.clone();
        }
        let mut params = self.params.clone();
        params.sort();
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, sep, query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    pub body: String,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Strict JSON parse of the body.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Transport-level failures. Non-200 statuses are not errors; they come back
/// as a `FetchResponse` so each step decides what they mean.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("gate closed; request not started")]
    Cancelled,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError>;

    /// 200 with a JSON body, else `None`. Transport errors, other statuses and
    /// unparseable bodies all collapse to `None`.
    async fn fetch_json(&self, req: &FetchRequest) -> Option<Value> {
        match self.fetch(req).await {
            Ok(resp) if resp.is_ok() => {
                let v = resp.json();
                if v.is_none() {
                    tracing::debug!(url = %req.signature(), "body is not JSON");
                }
                v
            }
            Ok(resp) => {
                tracing::debug!(url = %req.signature(), status = resp.status, "non-200 response");
                None
            }
            Err(e) => {
                tracing::debug!(url = %req.signature(), error = %e, "request failed");
                None
            }
        }
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        (**self).fetch(req).await
    }
}

/// Wraps a fetcher so each request holds a gate slot while in flight.
pub struct GatedFetcher<F> {
    inner: F,
    gate: Gate,
}

impl<F: Fetcher> GatedFetcher<F> {
    pub fn new(inner: F, gate: Gate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for GatedFetcher<F> {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let _slot = self.gate.admit().await.ok_or(FetchError::Cancelled)?;
        self.inner.fetch(req).await
    }
}
