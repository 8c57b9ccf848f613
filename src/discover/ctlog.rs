// src/discover/ctlog.rs
//! Certificate-transparency strategy.
//!
//! The query space is split by the first character after the `sapl.` prefix
//! (26 partitions) so the search service neither truncates nor throttles a
//! single huge answer. Each partition is retried with `RetryPolicy::ctlog`;
//! when every partition comes back empty, one unpartitioned query is tried.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::fetch::{FetchError, FetchRequest, Fetcher};
use crate::model::{CandidateHost, Locality, Strategy};
use crate::retry::{retry, Attempt, RetryPolicy};

pub const CRTSH_URL: &str = "https://crt.sh/";
pub const HOST_PREFIX: &str = "sapl.";
pub const HOST_SUFFIX: &str = ".leg.br";
pub const FALLBACK_PATTERN: &str = "sapl.%";

/// `sapl.a%` .. `sapl.z%`.
pub fn partition_patterns() -> Vec<String> {
    ('a'..='z').map(|c| format!("{HOST_PREFIX}{c}%")).collect()
}

/// Search request for one pattern (`%` is the service's wildcard).
pub fn query_request(pattern: &str) -> FetchRequest {
    FetchRequest::get(CRTSH_URL)
        .param("q", pattern)
        .param("output", "json")
        .param("exclude", "expired")
}

/// Candidates from every partition, deduplicated and sorted by host.
pub async fn search_candidates(fetcher: &dyn Fetcher, policy: &RetryPolicy) -> Vec<CandidateHost> {
    let mut found: BTreeMap<String, String> = BTreeMap::new();
    let mut answered = 0usize;

    for pattern in partition_patterns() {
        let hosts = query_partition(fetcher, policy, &pattern).await;
        if !hosts.is_empty() {
            answered += 1;
        }
        for h in hosts {
            found.entry(h).or_insert_with(|| pattern.clone());
        }
    }

    if answered == 0 {
        tracing::warn!("every certificate-search partition failed; trying one unpartitioned query");
        for h in query_partition(fetcher, policy, FALLBACK_PATTERN).await {
            found.entry(h).or_insert_with(|| FALLBACK_PATTERN.to_string());
        }
    }

    tracing::info!(partitions_answered = answered, hosts = found.len(), "certificate search finished");
    found
        .into_iter()
        .map(|(host, pattern)| CandidateHost::new(host, Strategy::CertificateSearch, pattern))
        .collect()
}

/// One pattern under the retry policy. Empty results, non-200 statuses and
/// transport errors are all retried; exhausting the attempts yields nothing.
pub async fn query_partition(fetcher: &dyn Fetcher, policy: &RetryPolicy, pattern: &str) -> Vec<String> {
    let req = query_request(pattern);
    let label = format!("crtsh:{pattern}");
    let out = retry(policy, &label, |_| {
        let req = &req;
        async move {
            match fetcher.fetch(req).await {
                Ok(resp) if resp.is_ok() => {
                    let hosts = parse_hosts(&resp.body);
                    if hosts.is_empty() {
                        Attempt::Retry("empty result".into())
                    } else {
                        Attempt::Done(hosts)
                    }
                }
                Ok(resp) => Attempt::Retry(format!("status {}", resp.status)),
                // Gate closed: no point waiting out the backoff.
                Err(FetchError::Cancelled) => Attempt::Done(Vec::new()),
                Err(e) => Attempt::Retry(e.to_string()),
            }
        }
    })
    .await;
    out.unwrap_or_default()
}

/// Tolerant body parse: JSON (array or single row), then NDJSON, then a
/// regex scan of the raw text. Only platform-shaped hostnames survive.
pub fn parse_hosts(body: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    if let Ok(v) = serde_json::from_str::<Value>(body) {
        match &v {
            Value::Array(rows) => rows.iter().for_each(|r| row_names(r, &mut names)),
            Value::Object(_) => row_names(&v, &mut names),
            _ => {}
        }
    } else {
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Ok(row) = serde_json::from_str::<Value>(line) {
                row_names(&row, &mut names);
            }
        }
    }

    if names.is_empty() {
        static RE_HOST: OnceCell<Regex> = OnceCell::new();
        let re = RE_HOST
            .get_or_init(|| Regex::new(r"(?i)\bsapl\.[a-z0-9.-]+\.leg\.br\b").unwrap());
        names.extend(re.find_iter(body).map(|m| m.as_str().to_ascii_lowercase()));
    }

    let mut hosts: Vec<String> = names.into_iter().filter(|h| is_platform_host(h)).collect();
    hosts.sort();
    hosts.dedup();
    hosts
}

fn row_names(row: &Value, out: &mut Vec<String>) {
    if let Some(nv) = row.get("name_value").and_then(Value::as_str) {
        out.extend(nv.lines().filter_map(clean_name));
    }
    if let Some(cn) = row.get("common_name").and_then(Value::as_str) {
        out.extend(clean_name(cn));
    }
}

fn clean_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_ascii_lowercase();
    let name = name.strip_prefix("*.").unwrap_or(&name);
    (!name.is_empty()).then(|| name.to_string())
}

/// `sapl.<label>...leg.br`, hostname characters only.
pub fn is_platform_host(h: &str) -> bool {
    h.starts_with(HOST_PREFIX)
        && h.ends_with(HOST_SUFFIX)
        && h.len() > HOST_PREFIX.len() + HOST_SUFFIX.len()
        && h.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        && !h.contains("..")
}

/// Best-effort locality for a `sapl.<slug>.<uf>.leg.br` host. The municipality
/// is the hostname slug; the registry id is unknown.
pub fn locality_from_host(host: &str) -> Locality {
    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n < 5 || labels[n - 2] != "leg" || labels[n - 1] != "br" {
        return Locality::default();
    }
    let uf = labels[n - 3];
    if uf.len() != 2 || !uf.chars().all(|c| c.is_ascii_alphabetic()) {
        return Locality::default();
    }
    Locality {
        ibge_id: None,
        municipio: labels[n - 4].to_string(),
        uf: uf.to_ascii_uppercase(),
    }
}
