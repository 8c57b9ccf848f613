// tests/config_load.rs
use sapl_harvest::config::{load_default, load_from, Mode, StrategySelection, ENV_CONFIG_PATH};
use std::{env, fs};

const OVERRIDES: [&str; 7] = [
    "HARVEST_MODE",
    "HARVEST_STRATEGY",
    "HARVEST_CONCURRENCY",
    "HARVEST_TIMEOUT_SECS",
    "HARVEST_PAGE_SIZE",
    "HARVEST_ENRICH",
    "HARVEST_RESUME",
];

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    for k in OVERRIDES {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn toml_and_json_files() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("harvest.toml");
    fs::write(
        &p_toml,
        r#"
mode = "discover"
strategy = "heuristic"

[discovery]
concurrency = 8
municipalities_path = "data/municipios.json"
"#,
    )
    .unwrap();
    let cfg = load_from(&p_toml).unwrap();
    assert_eq!(cfg.mode, Mode::Discover);
    assert_eq!(cfg.strategy, StrategySelection::Heuristic);
    assert_eq!(cfg.discovery.concurrency, 8);
    assert_eq!(cfg.discovery.timeout_secs, 20);
    assert!(cfg.discovery.municipalities_path.is_some());

    let p_json = dir.path().join("harvest.json");
    fs::write(&p_json, r#"{"extraction": {"page_size": 0, "enrich": false}}"#).unwrap();
    let cfg = load_from(&p_json).unwrap();
    assert_eq!(cfg.extraction.page_size, 1);
    assert!(!cfg.extraction.enrich);
    assert_eq!(cfg.mode, Mode::All);

    fs::write(&p_toml, "mode = \"sideways\"").unwrap();
    assert!(load_from(&p_toml).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    clear_env();
    // Isolate CWD so the repo's own config/ is not read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) Nothing on disk: defaults.
    let cfg = load_default().unwrap();
    assert_eq!(cfg.extraction.concurrency, 20);

    // 2) ./config/harvest.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/harvest.toml"), "[extraction]\nconcurrency = 3\n").unwrap();
    assert_eq!(load_default().unwrap().extraction.concurrency, 3);

    // 3) env path wins; a dangling env path is an error.
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"extraction": {"concurrency": 7}}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(load_default().unwrap().extraction.concurrency, 7);
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_on_top() {
    clear_env();
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::set_var("HARVEST_MODE", "Extract");
    env::set_var("HARVEST_CONCURRENCY", "5");
    env::set_var("HARVEST_PAGE_SIZE", "250");
    env::set_var("HARVEST_ENRICH", "off");
    env::set_var("HARVEST_RESUME", "yes");
    let cfg = load_default().unwrap();
    assert_eq!(cfg.mode, Mode::Extract);
    assert_eq!(cfg.discovery.concurrency, 5);
    assert_eq!(cfg.extraction.concurrency, 5);
    assert_eq!(cfg.extraction.page_size, 250);
    assert!(!cfg.extraction.enrich);
    assert!(cfg.extraction.resume);

    env::set_var("HARVEST_TIMEOUT_SECS", "soon");
    assert!(load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}
