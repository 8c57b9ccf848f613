// src/discover/mod.rs
//! Candidate generation + validation. Confirmed hosts go to the writer as
//! soon as they are found.

pub mod ctlog;
pub mod heuristic;
pub mod validator;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::RunConfig;
use crate::fetch::Fetcher;
use crate::model::{DiscoverySource, ValidatedHost};
use crate::retry::RetryPolicy;
use crate::writer::DedupWriter;

/// Counts for one discovery run.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub municipalities: usize,
    pub candidates: usize,
    pub confirmed: usize,
    /// New lines in the host log (confirmations minus duplicates).
    pub written: usize,
}

/// Run the selected strategies and persist every confirmed host.
///
/// The municipality list is loaded before any probing starts; a configured
/// local list that does not exist is the only error besides writer I/O.
pub async fn run_discovery(
    cfg: &RunConfig,
    fetcher: &dyn Fetcher,
    writer: &DedupWriter<ValidatedHost>,
) -> Result<DiscoveryReport> {
    crate::telemetry::ensure_metrics_described();
    let started_at = Utc::now();
    let limit = cfg.discovery.concurrency.max(1);

    let municipalities = if cfg.strategy.heuristic() {
        heuristic::load_municipalities(fetcher, &cfg.discovery).await?
    } else {
        Vec::new()
    };

    let mut report = DiscoveryReport {
        started_at,
        finished_at: started_at,
        municipalities: municipalities.len(),
        candidates: 0,
        confirmed: 0,
        written: 0,
    };

    if cfg.strategy.heuristic() {
        tracing::info!(municipalities = municipalities.len(), "heuristic strategy started");
        let mut outcomes = stream::iter(municipalities.iter())
            .map(|m| heuristic::probe_municipality(fetcher, m))
            .buffer_unordered(limit);
        while let Some(outcome) = outcomes.next().await {
            metrics::counter!("harvest_candidates_total", "strategy" => "heuristic")
                .increment(outcome.candidates as u64);
            let rejected = outcome.candidates.saturating_sub(outcome.hosts.len());
            metrics::counter!("harvest_hosts_rejected_total").increment(rejected as u64);
            report.candidates += outcome.candidates;
            for host in outcome.hosts {
                record(writer, host, &mut report)?;
            }
        }
    }

    if cfg.strategy.ctlog() {
        let candidates = ctlog::search_candidates(fetcher, &RetryPolicy::ctlog()).await;
        metrics::counter!("harvest_candidates_total", "strategy" => "certificate-search")
            .increment(candidates.len() as u64);
        report.candidates += candidates.len();

        let mut confirmations = stream::iter(candidates.iter())
            .map(|c| async move {
                let conf = validator::validate_host(fetcher, &c.host).await;
                (c, conf)
            })
            .buffer_unordered(limit);
        while let Some((c, conf)) = confirmations.next().await {
            match conf {
                Some(conf) => {
                    let locality = ctlog::locality_from_host(&c.host);
                    let host = ValidatedHost::from_confirmation(conf, &locality, DiscoverySource::Crtsh);
                    record(writer, host, &mut report)?;
                }
                None => metrics::counter!("harvest_hosts_rejected_total").increment(1),
            }
        }
    }

    report.finished_at = Utc::now();
    metrics::gauge!("harvest_last_run_ts").set(report.finished_at.timestamp() as f64);
    tracing::info!(
        candidates = report.candidates,
        confirmed = report.confirmed,
        written = report.written,
        "discovery finished"
    );
    Ok(report)
}

fn record(
    writer: &DedupWriter<ValidatedHost>,
    host: ValidatedHost,
    report: &mut DiscoveryReport,
) -> Result<()> {
    metrics::counter!("harvest_hosts_confirmed_total", "source" => host.source.as_str())
        .increment(1);
    report.confirmed += 1;
    if writer.accept(host)? {
        report.written += 1;
    }
    Ok(())
}
