use std::sync::Mutex;

use tempfile::NamedTempFile;

use gate_kernel::config::GateConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "GATE_CONFIG",
        "GATE_DB_PATH",
        "GATE_VIDEO_URL",
        "GATE_RESOURCE_ID",
        "GATE_SAMPLE_EVERY",
        "GATE_COOLDOWN_SECS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = GateConfig::load().expect("load config");

    assert_eq!(cfg.db_path, "gate.db");
    assert_eq!(cfg.resource_id, "main_lot");
    assert_eq!(cfg.video.url, "stub://lane_camera");
    assert_eq!(cfg.sample_every_n_frames, 3);
    assert_eq!(cfg.window_size, 5);
    assert_eq!(cfg.min_votes, 3);
    assert_eq!(cfg.cooldown.as_secs(), 15);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "db_path": "lane1.db",
        "resource_id": "lot_b",
        "video": {
            "url": "stub://lane_1",
            "target_fps": 25,
            "width": 800,
            "height": 600
        },
        "sampling": {
            "every_n_frames": 2,
            "detector_confidence_threshold": 0.6
        },
        "voting": {
            "window_size": 40,
            "min_votes": 5
        },
        "validation": {
            "min_length": 6,
            "fallback_min_length": 8,
            "fallback_min_confidence": 0.7
        },
        "cooldown_seconds": 30
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("GATE_CONFIG", file.path());
    std::env::set_var("GATE_RESOURCE_ID", "lot_c");
    std::env::set_var("GATE_COOLDOWN_SECS", "45");

    let cfg = GateConfig::load().expect("load config");

    assert_eq!(cfg.db_path, "lane1.db");
    assert_eq!(cfg.resource_id, "lot_c");
    assert_eq!(cfg.video.url, "stub://lane_1");
    assert_eq!(cfg.video.target_fps, 25);
    assert_eq!(cfg.video.width, 800);
    assert_eq!(cfg.video.height, 600);
    assert_eq!(cfg.sample_every_n_frames, 2);
    assert!((cfg.detector_confidence_threshold - 0.6).abs() < f32::EPSILON);
    assert_eq!(cfg.window_size, 40);
    assert_eq!(cfg.min_votes, 5);
    assert_eq!(cfg.recognizer_min_length, 6);
    assert_eq!(cfg.fallback_min_length, 8);
    assert_eq!(cfg.cooldown.as_secs(), 45);

    clear_env();
}

#[test]
fn rejects_min_votes_above_window() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "voting": { "window_size": 3, "min_votes": 4 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("GATE_CONFIG", file.path());
    assert!(GateConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_cooldown_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GATE_COOLDOWN_SECS", "soon");
    assert!(GateConfig::load().is_err());

    clear_env();
}
