// src/extract/pager.rs
//! Pagination over listing endpoints whose convention is not known up front.
//!
//! Every response is reduced to a `PageStep` once, from its shape:
//! - `pagination.next_page` numeric → `NumericContinuation`
//! - `pagination.links.next` or top-level `next` → `LinkedNext`
//! - anything else (or a bare array) → `Terminal`
//!
//! The pager refuses to issue a request whose signature it has already
//! issued for this listing, so a host that points back at an earlier page
//! ends the listing instead of looping.

use serde_json::{Map, Value};
use std::collections::HashSet;
use url::Url;

use crate::fetch::{FetchError, FetchRequest, Fetcher};

pub type Item = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStep {
    /// Same endpoint and params, `page=<n>`.
    NumericContinuation(u64),
    /// Absolute URL of the next page.
    LinkedNext(String),
    Terminal,
}

/// One decoded listing response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub step: PageStep,
}

/// Decode a listing body. `None` for shapes that carry no items at all.
pub fn read_page(data: &Value, page_url: &str) -> Option<Page> {
    match data {
        Value::Object(obj) => {
            let results = obj.get("results")?.as_array()?;
            Some(Page {
                items: objects(results),
                step: resolve_step(data, page_url),
            })
        }
        Value::Array(rows) => Some(Page {
            items: objects(rows),
            step: PageStep::Terminal,
        }),
        _ => None,
    }
}

fn objects(rows: &[Value]) -> Vec<Item> {
    rows.iter().filter_map(|v| v.as_object().cloned()).collect()
}

/// Decide how to continue from an envelope response. Relative links are
/// resolved against `page_url`.
pub fn resolve_step(data: &Value, page_url: &str) -> PageStep {
    if let Some(n) = data.pointer("/pagination/next_page").and_then(positive_int) {
        return PageStep::NumericContinuation(n);
    }
    let link = [data.pointer("/pagination/links/next"), data.get("next")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty());
    match link {
        Some(href) => match Url::parse(page_url).and_then(|base| base.join(href)) {
            Ok(abs) => PageStep::LinkedNext(abs.to_string()),
            Err(e) => {
                tracing::debug!(page_url, href, error = %e, "unresolvable next link");
                PageStep::Terminal
            }
        },
        None => PageStep::Terminal,
    }
}

fn positive_int(v: &Value) -> Option<u64> {
    let n = v.as_u64().or_else(|| v.as_str()?.trim().parse().ok())?;
    (n > 0).then_some(n)
}

/// Request for the page after `step`, built from the listing's first request.
/// A next link that carries its own query replaces the params; otherwise the
/// original params are kept.
pub fn next_request(first: &FetchRequest, step: &PageStep) -> Option<FetchRequest> {
    match step {
        PageStep::NumericContinuation(n) => {
            let mut params: Vec<(String, String)> = first
                .params
                .iter()
                .filter(|(k, _)| k != "page")
                .cloned()
                .collect();
            params.push(("page".to_string(), n.to_string()));
            Some(FetchRequest::get(&first.url).with_params(params))
        }
        PageStep::LinkedNext(url) if url.contains('?') => Some(FetchRequest::get(url)),
        PageStep::LinkedNext(url) => Some(FetchRequest::get(url).with_params(first.params.clone())),
        PageStep::Terminal => None,
    }
}

/// Page-by-page iterator over one listing.
pub struct Pager<'a> {
    fetcher: &'a dyn Fetcher,
    first: FetchRequest,
    next: Option<FetchRequest>,
    issued: HashSet<String>,
    pages: usize,
    cancelled: bool,
}

impl<'a> Pager<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, first: FetchRequest) -> Self {
        let mut issued = HashSet::new();
        issued.insert(first.signature());
        Self {
            fetcher,
            next: Some(first.clone()),
            first,
            issued,
            pages: 0,
            cancelled: false,
        }
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// The listing ended because the gate refused a page request.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Items of the next page, or `None` once the listing is over (terminal
    /// page, failed or cancelled fetch, unreadable body, or a repeated request).
    pub async fn next_page(&mut self) -> Option<Vec<Item>> {
        let req = self.next.take()?;
        let data = match self.fetcher.fetch(&req).await {
            Ok(resp) if resp.is_ok() => match resp.json() {
                Some(v) => v,
                None => {
                    tracing::debug!(url = %req.signature(), "listing page is not JSON");
                    return None;
                }
            },
            Ok(resp) => {
                tracing::debug!(url = %req.signature(), status = resp.status, "listing page non-200");
                return None;
            }
            Err(FetchError::Cancelled) => {
                self.cancelled = true;
                return None;
            }
            Err(e) => {
                tracing::debug!(url = %req.signature(), error = %e, "listing page failed");
                return None;
            }
        };
        let Some(page) = read_page(&data, &req.url) else {
            tracing::debug!(url = %req.signature(), "listing body has no items; stopping");
            return None;
        };
        self.pages += 1;
        metrics::counter!("harvest_pages_fetched_total").increment(1);

        if let Some(next) = next_request(&self.first, &page.step) {
            let sig = next.signature();
            if self.issued.insert(sig.clone()) {
                self.next = Some(next);
            } else {
                metrics::counter!("harvest_pagination_loops_total").increment(1);
                tracing::warn!(url = %sig, pages = self.pages, "pagination loop detected; stopping");
            }
        }
        Some(page.items)
    }

    /// Drain the listing.
    pub async fn collect_all(mut self) -> Vec<Item> {
        let mut out = Vec::new();
        while let Some(items) = self.next_page().await {
            out.extend(items);
        }
        out
    }
}
