// src/discover/heuristic.rs
//! Heuristic strategy: one platform-prefixed and one bare hostname per
//! municipality, plus a link scan of the bare host's home page when neither
//! validates directly.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use url::Url;

use super::validator::{probe_url, validate_host};
use crate::config::DiscoveryConfig;
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{CandidateHost, Confirmation, DiscoverySource, Locality, Strategy, ValidatedHost};
use crate::text::slugify;

pub const PREFIXED_PATTERN: &str = "sapl.{slug}.{uf}.leg.br";
pub const BARE_PATTERN: &str = "{slug}.{uf}.leg.br";

/// `href` substrings that make a home-page link worth probing.
pub const LINK_HINTS: [&str; 3] = ["materia/pesquisar-materia", "/sapl", "sapl."];
const SEARCH_SUFFIX: &str = "/materia/pesquisar-materia";
const MAX_SCANNED_LINKS: usize = 12;

/// One row of the municipality reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Municipality {
    pub ibge_id: Option<u64>,
    pub name: String,
    pub uf: String,
}

impl Municipality {
    pub fn locality(&self) -> Locality {
        Locality {
            ibge_id: self.ibge_id,
            municipio: self.name.clone(),
            uf: self.uf.clone(),
        }
    }
}

/// Load the reference list: a local file when configured (it must exist),
/// otherwise the remote registry. A failed remote fetch yields an empty list.
pub async fn load_municipalities(
    fetcher: &dyn Fetcher,
    cfg: &DiscoveryConfig,
) -> Result<Vec<Municipality>> {
    if let Some(path) = &cfg.municipalities_path {
        return read_municipalities(path);
    }
    let Some(v) = fetcher
        .fetch_json(&FetchRequest::get(&cfg.municipalities_url))
        .await
    else {
        tracing::warn!(url = %cfg.municipalities_url, "municipality list unavailable; heuristic strategy skipped");
        return Ok(Vec::new());
    };
    let list = parse_municipalities(&v);
    tracing::info!(count = list.len(), "municipality list loaded");
    Ok(list)
}

/// Read the list from disk. A missing file is an error.
pub fn read_municipalities(path: &Path) -> Result<Vec<Municipality>> {
    if !path.exists() {
        return Err(anyhow!("municipality list not found: {}", path.display()));
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading municipality list {}", path.display()))?;
    let v: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing municipality list {}", path.display()))?;
    let list = parse_municipalities(&v);
    tracing::info!(path = %path.display(), count = list.len(), "municipality list loaded");
    Ok(list)
}

/// Tolerant parse of the registry payload. Entries without a name or a state are skipped.
pub fn parse_municipalities(v: &Value) -> Vec<Municipality> {
    let Some(rows) = v.as_array() else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            let name = row.get("nome").and_then(Value::as_str)?.trim();
            let uf = state_of(row)?;
            if name.is_empty() {
                return None;
            }
            Some(Municipality {
                ibge_id: row.get("id").and_then(as_u64),
                name: name.to_string(),
                uf,
            })
        })
        .collect()
}

fn state_of(row: &Value) -> Option<String> {
    let nested = [
        "/microrregiao/mesorregiao/UF/sigla",
        "/regiao-imediata/regiao-intermediaria/UF/sigla",
        "/uf",
        "/sigla",
    ];
    nested
        .iter()
        .filter_map(|p| row.pointer(p).and_then(Value::as_str))
        .map(|s| s.trim().to_ascii_uppercase())
        .find(|s| !s.is_empty())
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str()?.trim().parse().ok())
}

/// The two hostnames derived from a municipality, prefixed form first.
/// Empty when the name has no ASCII letters or digits left after slugging.
pub fn candidate_hosts(m: &Municipality) -> Vec<CandidateHost> {
    let slug = slugify(&m.name);
    let uf = m.uf.to_ascii_lowercase();
    if slug.is_empty() || uf.is_empty() {
        return Vec::new();
    }
    vec![
        CandidateHost::new(format!("sapl.{slug}.{uf}.leg.br"), Strategy::Heuristic, PREFIXED_PATTERN),
        CandidateHost::new(format!("{slug}.{uf}.leg.br"), Strategy::Heuristic, BARE_PATTERN),
    ]
}

/// Discovery source recorded when a heuristic candidate validates directly.
pub fn source_for(candidate: &CandidateHost) -> DiscoverySource {
    if candidate.pattern == PREFIXED_PATTERN {
        DiscoverySource::IbgeHeuristic
    } else {
        DiscoverySource::BaseHostEndpoint
    }
}

/// Outcome for one municipality.
#[derive(Debug, Default)]
pub struct MunicipalityOutcome {
    pub candidates: usize,
    pub hosts: Vec<ValidatedHost>,
}

/// Validate both candidates; a bare host that fails is link-scanned even
/// when the prefixed host already confirmed.
pub async fn probe_municipality(fetcher: &dyn Fetcher, m: &Municipality) -> MunicipalityOutcome {
    let locality = m.locality();
    let candidates = candidate_hosts(m);
    let mut out = MunicipalityOutcome {
        candidates: candidates.len(),
        hosts: Vec::new(),
    };

    for c in &candidates {
        if let Some(conf) = validate_host(fetcher, &c.host).await {
            out.hosts.push(ValidatedHost::from_confirmation(conf, &locality, source_for(c)));
        } else if c.pattern == BARE_PATTERN {
            if let Some(conf) = link_scan(fetcher, &c.host).await {
                out.hosts.push(ValidatedHost::from_confirmation(
                    conf,
                    &locality,
                    DiscoverySource::PortalLinkScan,
                ));
            }
        }
    }
    out
}

/// Fetch the host's home page and probe links that look like a portal entry.
pub async fn link_scan(fetcher: &dyn Fetcher, host: &str) -> Option<Confirmation> {
    let home = format!("https://{host}/");
    let resp = fetcher.fetch(&FetchRequest::get(&home)).await.ok()?;
    if !resp.is_ok() {
        return None;
    }
    let page_url = Url::parse(&resp.final_url)
        .or_else(|_| Url::parse(&home))
        .ok()?;
    let links = scan_links(&resp.body, &page_url);
    tracing::debug!(host, links = links.len(), "home page link scan");

    for link in links.iter().take(MAX_SCANNED_LINKS) {
        if let Some(conf) = probe_url(fetcher, link).await {
            tracing::info!(host, url = %conf.url, "portal confirmed via home page link");
            return Some(conf);
        }
    }
    None
}

/// Absolute, deduplicated, sorted portal-looking links from a page.
/// Links ending in `/sapl` are pointed at the search page below them.
pub fn scan_links(html: &str, page_url: &Url) -> Vec<String> {
    static RE_HREF: OnceCell<Regex> = OnceCell::new();
    let re = RE_HREF
        .get_or_init(|| Regex::new(r#"(?i)href\s*=\s*["']([^"'#]+)["']"#).unwrap());

    let mut out = BTreeSet::new();
    for cap in re.captures_iter(html) {
        let href = html_escape::decode_html_entities(cap[1].trim()).to_string();
        let lower = href.to_ascii_lowercase();
        if !LINK_HINTS.iter().any(|h| lower.contains(h)) {
            continue;
        }
        let Ok(mut abs) = page_url.join(&href) else {
            continue;
        };
        if !matches!(abs.scheme(), "http" | "https") {
            continue;
        }
        let path = abs.path().trim_end_matches('/').to_string();
        if path.to_ascii_lowercase().ends_with("/sapl") {
            abs.set_path(&format!("{path}{SEARCH_SUFFIX}"));
        }
        out.insert(abs.to_string());
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_and_flat_states() {
        let v = json!([
            {"id": 3550308, "nome": "São Paulo",
             "microrregiao": {"mesorregiao": {"UF": {"sigla": "SP"}}}},
            {"id": "5300108", "nome": "Brasília", "microrregiao": null,
             "regiao-imediata": {"regiao-intermediaria": {"UF": {"sigla": "DF"}}}},
            {"id": 1, "nome": "Flat", "uf": "mg"},
            {"id": 2, "nome": "No State"},
            {"id": 3, "nome": "  ", "uf": "SP"}
        ]);
        let list = parse_municipalities(&v);
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].uf, "SP");
        assert_eq!(list[1].uf, "DF");
        assert_eq!(list[1].ibge_id, Some(5300108));
        assert_eq!(list[2].uf, "MG");
    }

    #[test]
    fn two_candidates_per_municipality() {
        let m = Municipality {
            ibge_id: None,
            name: "Embu-Guaçu".into(),
            uf: "SP".into(),
        };
        let hosts: Vec<_> = candidate_hosts(&m).into_iter().map(|c| c.host).collect();
        assert_eq!(hosts, vec!["sapl.embuguacu.sp.leg.br", "embuguacu.sp.leg.br"]);
    }

    #[test]
    fn link_scan_absolutizes_and_rewrites() {
        let base = Url::parse("https://itu.sp.leg.br/").unwrap();
        let html = r#"
            <a href="/noticias">news</a>
            <a href="/sapl">SAPL</a>
            <a href="https://sapl.itu.sp.leg.br/materia/pesquisar-materia">busca</a>
            <a href="/sapl/">dup</a>
        "#;
        let links = scan_links(html, &base);
        assert_eq!(
            links,
            vec![
                "https://itu.sp.leg.br/sapl/materia/pesquisar-materia",
                "https://sapl.itu.sp.leg.br/materia/pesquisar-materia",
            ]
        );
    }
}
