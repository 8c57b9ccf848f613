// src/extract/taxonomy.rs
//! Bill types from a host's own taxonomy, filtered to bills of law.

use serde_json::Value;

use super::pager::{Item, Pager};
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::BillType;
use crate::text::contains_normalized;

pub const TYPES_PATH: &str = "/api/materia/tipomaterialegislativa/";
pub const TYPES_PAGE_SIZE: u32 = 500;
/// Normalized phrase a kept type's label must contain.
pub const BILL_PHRASE: &str = "projeto de lei";

/// `sigla descricao nome`, skipping absent fields.
pub fn type_label(item: &Item) -> String {
    ["sigla", "descricao", "nome"]
        .iter()
        .filter_map(|k| match item.get(*k)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `id`, else `pk`; numbers or numeric strings.
pub fn item_id(item: &Item) -> Option<i64> {
    ["id", "pk"].iter().find_map(|k| {
        let v = item.get(*k)?;
        v.as_i64().or_else(|| v.as_str()?.trim().parse().ok())
    })
}

/// Keep types whose normalized label contains `BILL_PHRASE`.
pub fn bill_types(items: &[Item]) -> Vec<BillType> {
    items
        .iter()
        .filter_map(|it| {
            let label = type_label(it);
            if !contains_normalized(&label, BILL_PHRASE) {
                return None;
            }
            Some(BillType {
                id: item_id(it)?,
                label,
            })
        })
        .collect()
}

/// Fetch the full (paginated) taxonomy and filter it.
pub async fn fetch_bill_types(fetcher: &dyn Fetcher, base: &str) -> Vec<BillType> {
    let url = format!("{}{}", base.trim_end_matches('/'), TYPES_PATH);
    let first = FetchRequest::get(url).param("page_size", TYPES_PAGE_SIZE);
    let items = Pager::new(fetcher, first).collect_all().await;
    let kept = bill_types(&items);
    tracing::info!(sapl_base = base, types = items.len(), kept = kept.len(), "bill types identified");
    kept
}
