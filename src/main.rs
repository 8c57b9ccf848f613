//! Portal harvester: binary entrypoint.
//! Loads the run config, wires the gated HTTP fetchers and runs discovery
//! and/or extraction.

use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sapl_harvest::config::{self, Mode};
use sapl_harvest::fetch::HttpFetcher;
use sapl_harvest::model::ValidatedHost;
use sapl_harvest::{run_discovery, run_extraction, telemetry, DedupWriter, Gate, GatedFetcher};

/// Compact text logs; JSON lines when HARVEST_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sapl_harvest=info,warn"));
    let json = std::env::var("HARVEST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default()?;
    tracing::info!(mode = ?cfg.mode, strategy = ?cfg.strategy, "run config loaded");

    if let Some(addr) = cfg.metrics_addr {
        telemetry::install_prometheus(addr)?;
    }
    telemetry::ensure_metrics_described();

    let discovery_gate = Gate::new(cfg.discovery.concurrency);
    let extraction_gate = Gate::new(cfg.extraction.concurrency);

    // Ctrl-C: stop admitting new requests; in-flight ones finish on their own.
    {
        let gates = [discovery_gate.clone(), extraction_gate.clone()];
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; finishing in-flight requests");
                gates.iter().for_each(Gate::close);
            }
        });
    }

    if matches!(cfg.mode, Mode::Discover | Mode::All) {
        let http = HttpFetcher::new(&cfg.user_agent, Duration::from_secs(cfg.discovery.timeout_secs))?;
        let fetcher = GatedFetcher::new(http, discovery_gate);
        let writer: DedupWriter<ValidatedHost> = DedupWriter::create(&cfg.discovery.hosts_out)?;

        let report = run_discovery(&cfg, &fetcher, &writer).await?;
        if let Some(snap) = &cfg.discovery.hosts_snapshot {
            writer.finalize(snap)?;
        }
        tracing::info!(
            started_at = %report.started_at,
            finished_at = %report.finished_at,
            candidates = report.candidates,
            confirmed = report.confirmed,
            written = report.written,
            hosts_log = %writer.path().display(),
            "[OK] discovery run complete"
        );
    }

    if matches!(cfg.mode, Mode::Extract | Mode::All) {
        let mut ext = cfg.extraction.clone();
        if cfg.mode == Mode::All {
            // Chain the stages: extract exactly what discovery just wrote.
            ext.hosts_in = cfg.discovery.hosts_out.clone();
        }
        let http = HttpFetcher::new(&cfg.user_agent, Duration::from_secs(ext.timeout_secs))?;
        let fetcher = GatedFetcher::new(http, extraction_gate);

        let report = run_extraction(&ext, &fetcher).await?;
        tracing::info!(
            started_at = %report.started_at,
            finished_at = %report.finished_at,
            hosts = report.hosts,
            no_endpoint = report.hosts_without_endpoint,
            cancelled = report.hosts_cancelled,
            written = report.written,
            total = report.total_records,
            "[OK] extraction run complete"
        );
    }

    Ok(())
}
