// src/extract/mod.rs
//! Per-host extraction: endpoint discovery → bill types → pagination →
//! optional enrichment. Every record is handed to the sink only once it is
//! complete.

pub mod endpoint;
pub mod enrich;
pub mod pager;
pub mod taxonomy;

use anyhow::Result;
use serde_json::Value;

use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{public_link, BillRecord, BillType, ValidatedHost};
use crate::writer::RecordSink;
use pager::{Item, Pager};

/// A confirmed host as seen by extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub base: String,
    pub municipio: String,
    pub uf: String,
}

impl Target {
    pub fn from_host(h: &ValidatedHost) -> Self {
        Self {
            base: base_from_sapl_url(&h.sapl_url),
            municipio: h.municipio.clone(),
            uf: h.uf.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub page_size: u32,
    pub enrich: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            enrich: true,
        }
    }
}

/// What happened on one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostReport {
    pub base: String,
    pub endpoint: Option<String>,
    pub types: usize,
    pub pages: usize,
    /// Records built from listing items.
    pub records: usize,
    /// Records the sink accepted as new.
    pub written: usize,
    /// Stopped because the gate closed during pagination or enrichment.
    pub cancelled: bool,
}

/// Application base of a validated URL: everything before `/materia/`.
///
/// `https://h/materia/pesquisar-materia` → `https://h`,
/// `https://h/sapl/materia/pesquisar-materia` → `https://h/sapl`.
pub fn base_from_sapl_url(url: &str) -> String {
    let url = url.trim();
    let path_start = url
        .find("://")
        .map(|i| i + 3)
        .and_then(|i| url[i..].find('/').map(|j| i + j));
    match path_start {
        Some(p) => {
            let (root, path) = url.split_at(p);
            let prefix = path.find("/materia/").map_or(path, |idx| &path[..idx]);
            format!("{root}{prefix}").trim_end_matches('/').to_string()
        }
        None => url.trim_end_matches('/').to_string(),
    }
}

fn int_field(item: &Item, key: &str) -> Option<i64> {
    let v = item.get(key)?;
    v.as_i64().or_else(|| v.as_str()?.trim().parse().ok())
}

fn text_field(item: &Item, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| match item.get(*k)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .next()
}

/// Listing item → record. `None` when the item has no usable id.
pub fn build_record(target: &Target, ty: &BillType, item: &Item) -> Option<BillRecord> {
    let materia_id = int_field(item, "id")?;
    Some(BillRecord {
        sapl_base: target.base.clone(),
        sapl_url: target.base.clone(),
        municipio: target.municipio.clone(),
        uf: target.uf.clone(),
        tipo_id: ty.id,
        tipo_label: ty.label.clone(),
        materia_id,
        numero: int_field(item, "numero"),
        ano: int_field(item, "ano"),
        ementa: text_field(item, &["ementa", "observacao"]),
        data_apresentacao: text_field(item, &["data_apresentacao", "data_recebimento"]),
        em_tramitacao: item.get("em_tramitacao").and_then(Value::as_bool),
        situacao: text_field(item, &["status", "situacao"]),
        link_publico: public_link(&target.base, materia_id),
        ultima_tramitacao_data: None,
        ultima_tramitacao_status: None,
    })
}

/// Run the four stages for one host. A host without a listing endpoint
/// yields an empty report; only sink errors are returned.
pub async fn extract_host(
    fetcher: &dyn Fetcher,
    target: &Target,
    opts: &ExtractOptions,
    sink: &dyn RecordSink<BillRecord>,
) -> Result<HostReport> {
    let mut report = HostReport {
        base: target.base.clone(),
        ..HostReport::default()
    };
    tracing::info!(sapl_base = %target.base, municipio = %target.municipio, uf = %target.uf, "extraction started");

    let Some(endpoint) = endpoint::discover_endpoint(fetcher, &target.base).await else {
        metrics::counter!("harvest_endpoint_missing_total").increment(1);
        tracing::warn!(sapl_base = %target.base, "bill listing endpoint not found");
        return Ok(report);
    };
    report.endpoint = Some(endpoint.clone());

    let types = taxonomy::fetch_bill_types(fetcher, &target.base).await;
    report.types = types.len();

    for ty in &types {
        tracing::debug!(sapl_base = %target.base, tipo_id = ty.id, tipo_label = %ty.label, "listing bill type");
        let first = FetchRequest::get(&endpoint)
            .param("tipo", ty.id)
            .param("page_size", opts.page_size);
        let mut pager = Pager::new(fetcher, first);

        while let Some(items) = pager.next_page().await {
            for item in &items {
                let Some(mut record) = build_record(target, ty, item) else {
                    continue;
                };
                report.records += 1;
                if opts.enrich {
                    match enrich::last_transition(fetcher, &target.base, record.materia_id).await {
                        Ok(t) => record.apply_transition(t),
                        Err(_) => {
                            report.cancelled = true;
                            report.pages += pager.pages();
                            tracing::warn!(sapl_base = %target.base, "cancelled; remaining records skipped");
                            return Ok(report);
                        }
                    }
                }
                if sink.accept(record)? {
                    report.written += 1;
                    metrics::counter!("harvest_bills_written_total").increment(1);
                }
            }
        }
        report.pages += pager.pages();
        if pager.cancelled() {
            report.cancelled = true;
            tracing::warn!(sapl_base = %target.base, tipo_id = ty.id, "cancelled during pagination; host stopped");
            return Ok(report);
        }
    }

    tracing::info!(
        sapl_base = %target.base,
        types = report.types,
        pages = report.pages,
        written = report.written,
        "extraction finished"
    );
    Ok(report)
}
