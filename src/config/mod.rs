// src/config/mod.rs
pub mod run;

pub use run::{DiscoveryConfig, ExtractionConfig, Mode, RunConfig, StrategySelection};

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "HARVEST_CONFIG_PATH";

/// Load a run config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<RunConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading run config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse(&content, ext.as_str())?;
    Ok(apply_env_overrides(cfg)?.sanitize())
}

/// Load the run config using env var + fallbacks:
/// 1) $HARVEST_CONFIG_PATH
/// 2) config/harvest.toml
/// 3) config/harvest.json
/// 4) built-in defaults
///
/// `HARVEST_*` overrides are applied on top in every case.
pub fn load_default() -> Result<RunConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in ["config/harvest.toml", "config/harvest.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Ok(apply_env_overrides(RunConfig::default())?.sanitize())
}

fn parse(s: &str, hint_ext: &str) -> Result<RunConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing JSON run config");
    }
    match toml::from_str::<RunConfig>(s) {
        Ok(cfg) => Ok(cfg),
        // Unknown extension: give JSON a chance before failing on the TOML error.
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!(toml_err))
            .context("parsing TOML run config"),
    }
}

/// Apply `HARVEST_*` environment overrides. Unparseable values are errors.
pub fn apply_env_overrides(mut cfg: RunConfig) -> Result<RunConfig> {
    if let Some(v) = env_str("HARVEST_MODE") {
        cfg.mode = serde_json::from_value(serde_json::Value::String(v.to_ascii_lowercase()))
            .with_context(|| format!("HARVEST_MODE={v}"))?;
    }
    if let Some(v) = env_str("HARVEST_STRATEGY") {
        cfg.strategy = serde_json::from_value(serde_json::Value::String(v.to_ascii_lowercase()))
            .with_context(|| format!("HARVEST_STRATEGY={v}"))?;
    }
    if let Some(v) = env_str("HARVEST_CONCURRENCY") {
        let n: usize = v.parse().with_context(|| format!("HARVEST_CONCURRENCY={v}"))?;
        cfg.discovery.concurrency = n;
        cfg.extraction.concurrency = n;
    }
    if let Some(v) = env_str("HARVEST_TIMEOUT_SECS") {
        let n: u64 = v.parse().with_context(|| format!("HARVEST_TIMEOUT_SECS={v}"))?;
        cfg.discovery.timeout_secs = n;
        cfg.extraction.timeout_secs = n;
    }
    if let Some(v) = env_str("HARVEST_PAGE_SIZE") {
        cfg.extraction.page_size = v.parse().with_context(|| format!("HARVEST_PAGE_SIZE={v}"))?;
    }
    if let Some(v) = env_str("HARVEST_ENRICH") {
        cfg.extraction.enrich = parse_flag(&v).with_context(|| format!("HARVEST_ENRICH={v}"))?;
    }
    if let Some(v) = env_str("HARVEST_RESUME") {
        cfg.extraction.resume = parse_flag(&v).with_context(|| format!("HARVEST_RESUME={v}"))?;
    }
    Ok(cfg)
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("not a boolean: {other}")),
    }
}
