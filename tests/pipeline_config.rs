use std::sync::Mutex;

use tempfile::NamedTempFile;

use lookout::config::PipelineConfig;
use lookout::FitPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LOOKOUT_CONFIG",
        "LOOKOUT_MODEL",
        "LOOKOUT_PRIMARY_LABEL",
        "LOOKOUT_MAX_DISPLAY",
        "LOOKOUT_FIT",
        "LOOKOUT_MIRROR",
        "LOOKOUT_SOURCE_URL",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": { "name": "efficientdet-lite0", "max_results": 8, "score_threshold": 0.1 },
        "filter": { "primary_label": "person", "primary_threshold": 0.02, "other_threshold": 0.3 },
        "display": {
            "width": 1440,
            "height": 2560,
            "fit": "fit",
            "rotation_degrees": 90,
            "reduced": { "width": 360, "height": 640 }
        },
        "source": { "url": "stub://front", "target_fps": 24, "width": 1280, "height": 720 },
        "zoom": { "ratio": 2.0, "max_ratio": 4.0 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("LOOKOUT_CONFIG", file.path());
    std::env::set_var("LOOKOUT_PRIMARY_LABEL", "cat");
    std::env::set_var("LOOKOUT_MAX_DISPLAY", "3");
    std::env::set_var("LOOKOUT_FIT", "fill");
    std::env::set_var("LOOKOUT_MIRROR", "1");

    let cfg = PipelineConfig::load().expect("load config");

    assert_eq!(cfg.model.name, "efficientdet-lite0");
    assert_eq!(cfg.model.max_results, 8);
    assert_eq!(cfg.model.score_threshold, 0.1);
    assert_eq!(cfg.filter.primary_label, "cat");
    assert_eq!(cfg.filter.primary_threshold, 0.02);
    assert_eq!(cfg.filter.other_threshold, 0.3);
    assert_eq!(cfg.filter.max_display, 3);
    assert_eq!(cfg.display.width, 1440);
    assert_eq!(cfg.display.height, 2560);
    assert_eq!(cfg.display.fit, FitPolicy::Fill);
    assert!(cfg.display.mirror);
    assert_eq!(cfg.display.rotation_degrees, 90);
    assert_eq!(cfg.display.reduced, Some((360, 640)));
    assert_eq!(cfg.source.url, "stub://front");
    assert_eq!(cfg.source.target_fps, 24);
    assert_eq!(cfg.source.rotation_degrees, 90);
    assert_eq!(cfg.zoom.ratio, 2.0);
    assert_eq!(cfg.zoom.min_ratio, 1.0);
    assert_eq!(cfg.zoom.max_ratio, 4.0);

    clear_env();
}

#[test]
fn defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load().expect("load defaults");
    assert_eq!(cfg, PipelineConfig::default());
    assert_eq!(cfg.filter.primary_label, "person");
    assert_eq!(cfg.filter.primary_threshold, 0.01);
    assert_eq!(cfg.filter.other_threshold, 0.10);
    assert_eq!((cfg.display.width, cfg.display.height), (1080, 1920));
    assert_eq!(cfg.source.url, "stub://rear_camera");
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "filter": { "primary_threshold": 1.5 } }"#)
        .expect("write config");
    let err = PipelineConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("primary_threshold"));

    std::env::set_var("LOOKOUT_FIT", "stretch");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    std::env::set_var("LOOKOUT_MAX_DISPLAY", "zero");
    assert!(PipelineConfig::load().is_err());
    clear_env();
}

#[test]
fn malformed_json_is_reported() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    let err = PipelineConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}
