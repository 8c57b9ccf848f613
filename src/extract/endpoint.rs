// src/extract/endpoint.rs
use crate::fetch::{FetchRequest, Fetcher};

/// Candidate listing endpoints, probed in order.
pub const LISTING_PATHS: [&str; 2] = ["/api/materia/", "/api/materia/materialegislativa/"];

/// First candidate answering 200 with any JSON body (an empty listing counts).
pub async fn discover_endpoint(fetcher: &dyn Fetcher, base: &str) -> Option<String> {
    let base = base.trim_end_matches('/');
    for path in LISTING_PATHS {
        let url = format!("{base}{path}");
        let probe = FetchRequest::get(&url).param("page_size", 1);
        if fetcher.fetch_json(&probe).await.is_some() {
            tracing::debug!(sapl_base = base, endpoint = %url, "listing endpoint selected");
            return Some(url);
        }
    }
    None
}
