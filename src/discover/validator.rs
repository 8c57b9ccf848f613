// src/discover/validator.rs
//! Host Validator: probe well-known paths, accept on the first 200 page that
//! carries a platform marker or a `<title>` naming the platform.
//! No retries here; a failing path is skipped.

use crate::fetch::{FetchRequest, Fetcher};
use crate::model::Confirmation;
use crate::text::{contains_normalized, fold, html_title, truncate_chars};
use once_cell::sync::Lazy;

/// Probed in order over HTTPS.
pub const CHECK_PATHS: [&str; 2] = ["/materia/pesquisar-materia", "/sapl/materia/pesquisar-materia"];

/// Page markers, matched on folded text (case and diacritics ignored).
pub const MARKERS: [&str; 4] = [
    "SAPL - Interlegis",
    "Pesquisar Matéria Legislativa",
    "Matérias Legislativas",
    "> SAPL <",
];

pub const PLATFORM_NAME: &str = "SAPL";
pub const TITLE_MARKER: &str = "title contains SAPL";

/// Only the head of the page is inspected.
const MAX_INSPECT_CHARS: usize = 20_000;

static FOLDED_MARKERS: Lazy<Vec<(&'static str, String)>> =
    Lazy::new(|| MARKERS.iter().map(|m| (*m, fold(m))).collect());

/// Pure page check. Returns `(marker, title)` when the page looks like the platform.
pub fn inspect_page(html: &str) -> Option<(String, String)> {
    let head = truncate_chars(html, MAX_INSPECT_CHARS);
    let title = html_title(head).unwrap_or_default();
    let body = fold(head);

    if let Some((marker, _)) = FOLDED_MARKERS.iter().find(|(_, m)| body.contains(m.as_str())) {
        return Some((marker.to_string(), title));
    }
    if contains_normalized(&title, PLATFORM_NAME) {
        return Some((TITLE_MARKER.to_string(), title));
    }
    None
}

/// Fetch one URL and apply `inspect_page` to a 200 response.
pub async fn probe_url(fetcher: &dyn Fetcher, url: &str) -> Option<Confirmation> {
    let resp = match fetcher.fetch(&FetchRequest::get(url)).await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(url, error = %e, "probe failed");
            return None;
        }
    };
    if !resp.is_ok() {
        tracing::debug!(url, status = resp.status, "probe non-200");
        return None;
    }
    let (marker, title) = inspect_page(&resp.body)?;
    Some(Confirmation {
        url: url.to_string(),
        http_status: resp.status,
        marker,
        title,
    })
}

/// Try every `CHECK_PATHS` entry on `https://{host}`; first match wins.
pub async fn validate_host(fetcher: &dyn Fetcher, host: &str) -> Option<Confirmation> {
    for path in CHECK_PATHS {
        let url = format!("https://{host}{path}");
        if let Some(c) = probe_url(fetcher, &url).await {
            tracing::info!(host, url = %c.url, marker = %c.marker, "portal confirmed");
            return Some(c);
        }
    }
    tracing::debug!(host, "host did not confirm");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_match_ignores_case_and_accents() {
        let html = "<html><body><h2>PESQUISAR MATERIA LEGISLATIVA</h2></body></html>";
        let (marker, _) = inspect_page(html).unwrap();
        assert_eq!(marker, "Pesquisar Matéria Legislativa");
    }

    #[test]
    fn bracketed_marker_needs_the_markup() {
        let (marker, _) = inspect_page("<a class=\"brand\"> SAPL </a>").unwrap();
        assert_eq!(marker, "> SAPL <");
    }

    #[test]
    fn title_fallback() {
        let html = "<html><head><title>Sapl: Câmara de Itu</title></head><body>x</body></html>";
        let (marker, title) = inspect_page(html).unwrap();
        assert_eq!(marker, TITLE_MARKER);
        assert_eq!(title, "Sapl: Câmara de Itu");
    }

    #[test]
    fn title_containing_the_name_inside_a_word() {
        let (marker, title) = inspect_page("<title>SAPL3 - Câmara Municipal</title>").unwrap();
        assert_eq!(marker, TITLE_MARKER);
        assert_eq!(title, "SAPL3 - Câmara Municipal");
        assert!(inspect_page("<title>eSAPL Câmara</title>").is_some());
    }

    #[test]
    fn unrelated_page_is_rejected() {
        assert!(inspect_page("<title>Prefeitura</title><p>Bem-vindo ao portal do SAPLING</p>").is_none());
        assert!(inspect_page("").is_none());
    }
}
