// src/model.rs
//! Records flowing through the pipeline: candidates, validated hosts, bill types, bills.

use serde::{Deserialize, Serialize};

/// How a candidate host was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Heuristic,
    CertificateSearch,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Heuristic => "heuristic",
            Strategy::CertificateSearch => "certificate-search",
        }
    }
}

/// A hostname worth probing. Ephemeral; never written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateHost {
    pub host: String,
    pub strategy: Strategy,
    /// Template or query that produced the host (e.g. `sapl.{slug}.{uf}.leg.br`, `sapl.a%25`).
    pub pattern: String,
}

impl CandidateHost {
    pub fn new(host: impl Into<String>, strategy: Strategy, pattern: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            strategy,
            pattern: pattern.into(),
        }
    }
}

/// Where a confirmed host came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoverySource {
    #[serde(rename = "ibge-heuristic")]
    IbgeHeuristic,
    #[serde(rename = "base-host-endpoint")]
    BaseHostEndpoint,
    #[serde(rename = "portal-link-scan")]
    PortalLinkScan,
    #[serde(rename = "crtsh")]
    Crtsh,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoverySource::IbgeHeuristic => "ibge-heuristic",
            DiscoverySource::BaseHostEndpoint => "base-host-endpoint",
            DiscoverySource::PortalLinkScan => "portal-link-scan",
            DiscoverySource::Crtsh => "crtsh",
        }
    }
}

/// One line of the validated-host stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedHost {
    #[serde(default)]
    pub ibge_id: Option<u64>,
    #[serde(default)]
    pub municipio: String,
    #[serde(default)]
    pub uf: String,
    pub source: DiscoverySource,
    /// Canonical URL of the page that passed validation.
    pub sapl_url: String,
    pub http_status: u16,
    pub marker: String,
    #[serde(default)]
    pub title: String,
}

/// What the validator learned about a host, before municipality context is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub url: String,
    pub http_status: u16,
    pub marker: String,
    pub title: String,
}

/// Municipality context attached to a confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locality {
    pub ibge_id: Option<u64>,
    pub municipio: String,
    pub uf: String,
}

impl ValidatedHost {
    pub fn from_confirmation(c: Confirmation, locality: &Locality, source: DiscoverySource) -> Self {
        Self {
            ibge_id: locality.ibge_id,
            municipio: locality.municipio.clone(),
            uf: locality.uf.clone(),
            source,
            sapl_url: c.url,
            http_status: c.http_status,
            marker: c.marker,
            title: c.title,
        }
    }
}

/// A bill type from a host's own taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillType {
    pub id: i64,
    pub label: String,
}

/// Latest status change of a bill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastTransition {
    pub date: Option<String>,
    pub status: Option<String>,
}

/// One line of the bill record stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub sapl_base: String,
    pub sapl_url: String,
    pub municipio: String,
    pub uf: String,
    pub tipo_id: i64,
    pub tipo_label: String,
    pub materia_id: i64,
    pub numero: Option<i64>,
    pub ano: Option<i64>,
    pub ementa: Option<String>,
    pub data_apresentacao: Option<String>,
    pub em_tramitacao: Option<bool>,
    pub situacao: Option<String>,
    pub link_publico: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ultima_tramitacao_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ultima_tramitacao_status: Option<String>,
}

impl BillRecord {
    pub fn apply_transition(&mut self, t: LastTransition) {
        self.ultima_tramitacao_data = t.date;
        self.ultima_tramitacao_status = t.status;
    }
}

/// Public page of a bill on its portal.
pub fn public_link(base: &str, materia_id: i64) -> String {
    format!("{}/materia/{}/acompanhar-materia/", base.trim_end_matches('/'), materia_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_link_shape() {
        assert_eq!(
            public_link("https://sapl.x.sp.leg.br", 42),
            "https://sapl.x.sp.leg.br/materia/42/acompanhar-materia/"
        );
        assert_eq!(
            public_link("https://x.sp.leg.br/sapl/", 7),
            "https://x.sp.leg.br/sapl/materia/7/acompanhar-materia/"
        );
    }

    #[test]
    fn validated_host_wire_names() {
        let h = ValidatedHost {
            ibge_id: Some(3550308),
            municipio: "São Paulo".into(),
            uf: "SP".into(),
            source: DiscoverySource::IbgeHeuristic,
            sapl_url: "https://sapl.saopaulo.sp.leg.br/materia/pesquisar-materia".into(),
            http_status: 200,
            marker: "SAPL - Interlegis".into(),
            title: "SAPL".into(),
        };
        let v = serde_json::to_value(&h).unwrap();
        assert_eq!(v["source"], "ibge-heuristic");
        assert_eq!(v["http_status"], 200);
        assert_eq!(v["ibge_id"], 3550308);
    }

    #[test]
    fn enrichment_fields_are_optional_on_the_wire() {
        let r = BillRecord {
            sapl_base: "https://h".into(),
            sapl_url: "https://h".into(),
            municipio: "M".into(),
            uf: "SP".into(),
            tipo_id: 1,
            tipo_label: "PL Projeto de Lei".into(),
            materia_id: 9,
            numero: Some(3),
            ano: Some(2024),
            ementa: None,
            data_apresentacao: None,
            em_tramitacao: Some(true),
            situacao: None,
            link_publico: public_link("https://h", 9),
            ultima_tramitacao_data: None,
            ultima_tramitacao_status: None,
        };
        let s = serde_json::to_string(&r).unwrap();
        assert!(!s.contains("ultima_tramitacao"));
        assert!(s.contains("\"link_publico\":\"https://h/materia/9/acompanhar-materia/\""));
    }
}
