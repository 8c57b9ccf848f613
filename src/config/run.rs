// src/config/run.rs
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const IBGE_MUNICIPIOS_URL: &str =
    "https://servicodados.ibge.gov.br/api/v1/localidades/municipios";

fn default_user_agent() -> String {
    crate::fetch::http::DEFAULT_USER_AGENT.to_string()
}

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Discover,
    Extract,
    #[default]
    All,
}

/// Which candidate strategies discovery uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategySelection {
    Heuristic,
    Ctlog,
    #[default]
    All,
}

impl StrategySelection {
    pub fn heuristic(&self) -> bool {
        matches!(self, Self::Heuristic | Self::All)
    }

    pub fn ctlog(&self) -> bool {
        matches!(self, Self::Ctlog | Self::All)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub municipalities_url: String,
    /// Local copy of the municipality list; when set it must exist.
    pub municipalities_path: Option<PathBuf>,
    pub hosts_out: PathBuf,
    pub hosts_snapshot: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            timeout_secs: 20,
            municipalities_url: IBGE_MUNICIPIOS_URL.to_string(),
            municipalities_path: None,
            hosts_out: PathBuf::from("out/sapl_hosts.jsonl"),
            hosts_snapshot: Some(PathBuf::from("out/sapl_hosts.json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub page_size: u32,
    /// Fetch `ultima_tramitacao` for every bill.
    pub enrich: bool,
    pub hosts_in: PathBuf,
    pub bills_out: PathBuf,
    pub bills_snapshot: Option<PathBuf>,
    /// Append to an existing `bills_out` instead of truncating it.
    pub resume: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            timeout_secs: 30,
            page_size: 100,
            enrich: true,
            hosts_in: PathBuf::from("out/sapl_hosts.jsonl"),
            bills_out: PathBuf::from("out/pl.jsonl"),
            bills_snapshot: Some(PathBuf::from("out/pl.json")),
            resume: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: Mode,
    pub strategy: StrategySelection,
    pub user_agent: String,
    /// Prometheus listener; off when absent.
    pub metrics_addr: Option<SocketAddr>,
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            strategy: StrategySelection::default(),
            user_agent: default_user_agent(),
            metrics_addr: None,
            discovery: DiscoveryConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl RunConfig {
    /// Clamp values into workable ranges.
    pub fn sanitize(mut self) -> Self {
        self.discovery.concurrency = self.discovery.concurrency.max(1);
        self.discovery.timeout_secs = self.discovery.timeout_secs.max(1);
        self.extraction.concurrency = self.extraction.concurrency.max(1);
        self.extraction.timeout_secs = self.extraction.timeout_secs.max(1);
        self.extraction.page_size = self.extraction.page_size.clamp(1, 1000);
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        // Empty strings in TOML mean "no snapshot".
        for slot in [
            &mut self.discovery.hosts_snapshot,
            &mut self.extraction.bills_snapshot,
            &mut self.discovery.municipalities_path,
        ] {
            if slot.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                *slot = None;
            }
        }
        self
    }
}
