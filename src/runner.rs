// src/runner.rs
//! Extraction run: validated-host stream in, bill record log out.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::ExtractionConfig;
use crate::extract::{extract_host, ExtractOptions, Target};
use crate::fetch::Fetcher;
use crate::model::{BillRecord, ValidatedHost};
use crate::writer::DedupWriter;

/// Counts for one extraction run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hosts: usize,
    pub hosts_without_endpoint: usize,
    pub hosts_cancelled: usize,
    pub written: usize,
    /// Lines in the log at the end of the run (restored ones included).
    pub total_records: u64,
    pub snapshot_records: Option<usize>,
}

/// Targets from the validated-host log, one per distinct base.
/// A missing file is an error; malformed or URL-less lines are skipped.
pub fn read_targets(path: &Path) -> Result<Vec<Target>> {
    if !path.exists() {
        return Err(anyhow!("validated-host file not found: {}", path.display()));
    }
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    let mut skipped = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ValidatedHost>(line) {
            Ok(h) if !h.sapl_url.trim().is_empty() => {
                let t = Target::from_host(&h);
                if seen.insert(t.base.clone()) {
                    targets.push(t);
                }
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "malformed host lines skipped");
    }
    tracing::info!(path = %path.display(), hosts = targets.len(), "targets loaded");
    Ok(targets)
}

/// Read targets, extract every host independently, then write the optional snapshot.
pub async fn run_extraction(cfg: &ExtractionConfig, fetcher: &dyn Fetcher) -> Result<ExtractionReport> {
    crate::telemetry::ensure_metrics_described();
    let started_at = Utc::now();
    let targets = read_targets(&cfg.hosts_in)?;

    let writer: DedupWriter<BillRecord> = if cfg.resume {
        DedupWriter::resume(&cfg.bills_out)?
    } else {
        DedupWriter::create(&cfg.bills_out)?
    };
    let opts = ExtractOptions {
        page_size: cfg.page_size,
        enrich: cfg.enrich,
    };

    let mut report = ExtractionReport {
        started_at,
        finished_at: started_at,
        hosts: targets.len(),
        hosts_without_endpoint: 0,
        hosts_cancelled: 0,
        written: 0,
        total_records: 0,
        snapshot_records: None,
    };

    let writer_ref = &writer;
    let opts_ref = &opts;
    let mut runs = stream::iter(targets.iter())
        .map(|t| extract_host(fetcher, t, opts_ref, writer_ref))
        .buffer_unordered(cfg.concurrency.max(1));
    while let Some(host) = runs.next().await {
        let host = host?;
        if host.endpoint.is_none() {
            report.hosts_without_endpoint += 1;
        }
        if host.cancelled {
            report.hosts_cancelled += 1;
        }
        report.written += host.written;
    }
    drop(runs);

    report.total_records = writer.count();
    if let Some(snap) = &cfg.bills_snapshot {
        report.snapshot_records = Some(writer.finalize(snap)?);
    }
    report.finished_at = Utc::now();
    metrics::gauge!("harvest_last_run_ts").set(report.finished_at.timestamp() as f64);
    tracing::info!(
        hosts = report.hosts,
        written = report.written,
        total = report.total_records,
        log = %writer.path().display(),
        "extraction finished"
    );
    Ok(report)
}
