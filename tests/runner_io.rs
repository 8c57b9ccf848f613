// tests/runner_io.rs
use sapl_harvest::config::ExtractionConfig;
use sapl_harvest::fetch::MockFetcher;
use sapl_harvest::model::BillRecord;
use sapl_harvest::runner::{read_targets, run_extraction};
use serde_json::json;
use std::fs;
use std::path::Path;

fn host_line(url: &str, municipio: &str) -> String {
    json!({
        "ibge_id": null, "municipio": municipio, "uf": "SP", "source": "crtsh",
        "sapl_url": url, "http_status": 200, "marker": "SAPL - Interlegis", "title": ""
    })
    .to_string()
}

fn config(dir: &Path) -> ExtractionConfig {
    ExtractionConfig {
        concurrency: 4,
        enrich: false,
        hosts_in: dir.join("hosts.jsonl"),
        bills_out: dir.join("pl.jsonl"),
        bills_snapshot: Some(dir.join("pl.json")),
        ..ExtractionConfig::default()
    }
}

/// One host with two bills; `https://down.example` has no API at all.
fn mock_hosts() -> MockFetcher {
    let m = MockFetcher::new();
    let base = "https://up.example/sapl";
    m.route_json(&format!("{base}/api/materia/?page_size=1"), &json!({"results": []}))
        .route_json(
            &format!("{base}/api/materia/tipomaterialegislativa/?page_size=500"),
            &json!([{"id": 3, "sigla": "PL", "descricao": "Projeto de Lei"}]),
        )
        .route_json(
            &format!("{base}/api/materia/?page_size=100&tipo=3"),
            &json!({"results": [{"id": 1, "numero": 1, "ano": 2024}, {"id": 2, "numero": 2, "ano": 2024}]}),
        );
    m
}

#[test]
fn missing_host_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_targets(&dir.path().join("nope.jsonl")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn malformed_lines_are_skipped_and_bases_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("hosts.jsonl");
    let lines = [
        host_line("https://up.example/sapl/materia/pesquisar-materia", "Up"),
        "{not json".to_string(),
        String::new(),
        host_line("", "Empty"),
        host_line("https://up.example/sapl/", "Up again"),
        host_line("https://down.example/materia/pesquisar-materia", "Down"),
    ];
    fs::write(&p, lines.join("\n")).unwrap();

    let targets = read_targets(&p).unwrap();
    let bases: Vec<_> = targets.iter().map(|t| t.base.as_str()).collect();
    assert_eq!(bases, vec!["https://up.example/sapl", "https://down.example"]);
    assert_eq!(targets[0].municipio, "Up");
}

#[tokio::test]
async fn run_writes_log_and_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    fs::write(
        &cfg.hosts_in,
        format!(
            "{}\n{}\n",
            host_line("https://up.example/sapl/materia/pesquisar-materia", "Up"),
            host_line("https://down.example/materia/pesquisar-materia", "Down")
        ),
    )
    .unwrap();

    let report = run_extraction(&cfg, &mock_hosts()).await.unwrap();
    assert_eq!(report.hosts, 2);
    assert_eq!(report.hosts_without_endpoint, 1);
    assert_eq!(report.written, 2);
    assert_eq!(report.snapshot_records, Some(2));

    let snap: Vec<BillRecord> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("pl.json")).unwrap()).unwrap();
    assert_eq!(snap[0].link_publico, "https://up.example/sapl/materia/1/acompanhar-materia/");
    assert_eq!(snap[0].municipio, "Up");
}

#[tokio::test]
async fn resume_keeps_previous_records_and_skips_known_ones() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    fs::write(&cfg.hosts_in, host_line("https://up.example/sapl/materia/pesquisar-materia", "Up")).unwrap();

    run_extraction(&cfg, &mock_hosts()).await.unwrap();
    cfg.resume = true;
    let second = run_extraction(&cfg, &mock_hosts()).await.unwrap();

    assert_eq!(second.written, 0);
    assert_eq!(second.total_records, 2);
    let log = fs::read_to_string(&cfg.bills_out).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[tokio::test]
async fn missing_input_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let mock = MockFetcher::new();
    assert!(run_extraction(&cfg, &mock).await.is_err());
    assert!(mock.calls().is_empty());
    assert!(!cfg.bills_out.exists());
}
