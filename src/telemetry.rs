// src/telemetry.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// One-time metrics registration (so series show up on the exporter before first use).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "harvest_candidates_total",
            "Candidate hosts generated, by strategy."
        );
        describe_counter!(
            "harvest_hosts_confirmed_total",
            "Hosts confirmed as portals, by discovery source."
        );
        describe_counter!("harvest_hosts_rejected_total", "Candidate hosts rejected.");
        describe_counter!("harvest_pages_fetched_total", "Listing pages fetched.");
        describe_counter!(
            "harvest_pagination_loops_total",
            "Paginations stopped by the loop guard."
        );
        describe_counter!(
            "harvest_endpoint_missing_total",
            "Hosts without a responding bill-listing endpoint."
        );
        describe_counter!("harvest_bills_written_total", "Bill records persisted.");
        describe_counter!(
            "harvest_dedup_dropped_total",
            "Records discarded as duplicates by the writer."
        );
        describe_counter!(
            "harvest_retries_total",
            "Backoff retries, by operation label."
        );
        describe_gauge!(
            "harvest_last_run_ts",
            "Unix ts when a discovery or extraction run last finished."
        );
    });
}

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from inside a Tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("installing prometheus exporter")?;
    ensure_metrics_described();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}
