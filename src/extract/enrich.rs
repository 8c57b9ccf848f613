// src/extract/enrich.rs
use serde_json::Value;

use crate::fetch::{FetchError, FetchRequest, Fetcher};
use crate::model::LastTransition;

const DATE_KEYS: [&str; 3] = ["data_tramitacao", "data", "data_registro"];
const STATUS_KEYS: [&str; 3] = ["status", "texto", "descricao"];

pub fn transition_url(base: &str, materia_id: i64) -> String {
    format!(
        "{}/api/materia/materialegislativa/{}/ultima_tramitacao/",
        base.trim_end_matches('/'),
        materia_id
    )
}

/// First non-empty string among `keys`.
fn first_string(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| v.get(*k)?.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn read_transition(v: &Value) -> LastTransition {
    LastTransition {
        date: first_string(v, &DATE_KEYS),
        status: first_string(v, &STATUS_KEYS),
    }
}

/// Latest status transition of a bill. A missing or unreadable sub-resource
/// is an empty transition; only `FetchError::Cancelled` is returned as an error.
pub async fn last_transition(
    fetcher: &dyn Fetcher,
    base: &str,
    materia_id: i64,
) -> Result<LastTransition, FetchError> {
    let req = FetchRequest::get(transition_url(base, materia_id));
    match fetcher.fetch(&req).await {
        Ok(resp) if resp.is_ok() => Ok(resp.json().map(|v| read_transition(&v)).unwrap_or_default()),
        Ok(resp) => {
            tracing::debug!(url = %req.url, status = resp.status, "no transition sub-resource");
            Ok(LastTransition::default())
        }
        Err(FetchError::Cancelled) => Err(FetchError::Cancelled),
        Err(e) => {
            tracing::debug!(url = %req.url, error = %e, "transition fetch failed");
            Ok(LastTransition::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_match_wins_and_empty_strings_are_skipped() {
        let t = read_transition(&json!({
            "data_tramitacao": "", "data": "2024-03-01", "data_registro": "2024-01-01",
            "status": 12, "texto": "Aprovado em 1º turno"
        }));
        assert_eq!(t.date.as_deref(), Some("2024-03-01"));
        assert_eq!(t.status.as_deref(), Some("Aprovado em 1º turno"));
        assert_eq!(read_transition(&json!([])), LastTransition::default());
    }
}
