// src/fetch/http.rs
use super::{FetchError, FetchRequest, FetchResponse, Fetcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "sapl-harvest/0.1 (+research use)";

/// Bodies above this are truncated; marker checks only need the page head.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// reqwest-backed fetcher: HTTPS, redirects followed, per-request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Thousands of distinct hosts; idle keep-alive sockets are wasted.
            .pool_max_idle_per_host(0)
            .build()
            .context("building reqwest client")?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let resp = self
            .client
            .get(&req.url)
            .query(&req.params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
        let slice = &bytes[..bytes.len().min(MAX_BODY_BYTES)];
        let body = String::from_utf8_lossy(slice).into_owned();

        tracing::debug!(url = %req.signature(), status, "GET");
        Ok(FetchResponse {
            status,
            final_url,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}
