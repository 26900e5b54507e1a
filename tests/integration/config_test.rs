//! Configuration Integration Tests
//!
//! The config file drives the store capacity: a changed `max_entries` applies
//! the next time a history is loaded.

use chrono::Local;
use tempfile::TempDir;

use coverage_panel::{AppError, ConfigService, ResultStore, SettingsUpdate};

#[test]
fn test_capacity_change_applies_on_next_load() {
    let temp = TempDir::new().unwrap();
    let mut config = ConfigService::from_path(temp.path().join("config.json")).unwrap();
    let history = temp.path().join("coverage.results.json");

    let mut store = ResultStore::load(&history, config.get_config().max_entries);
    for i in 0..6 {
        store
            .put(format!("/proj/{}.py", i), Local::now(), "r")
            .unwrap();
    }
    assert_eq!(store.len(), 6);

    config
        .update_config(SettingsUpdate {
            max_entries: Some(3),
            ..Default::default()
        })
        .unwrap();

    let reopened = ConfigService::from_path(config.path()).unwrap();
    let store = ResultStore::load(&history, reopened.get_config().max_entries);
    assert_eq!(store.capacity(), 3);
    assert_eq!(store.len(), 3);
    assert_eq!(store.entries()[0].path.to_string_lossy(), "/proj/5.py");
}

#[test]
fn test_invalid_update_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut config = ConfigService::from_path(temp.path().join("config.json")).unwrap();

    let result = config.update_config(SettingsUpdate {
        max_entries: Some(0),
        ..Default::default()
    });
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(config.get_config().max_entries, 50);

    config.reload().unwrap();
    assert_eq!(config.get_config().max_entries, 50);
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(&path, r#"{"max_entries": 7}"#).unwrap();

    let config = ConfigService::from_path(&path).unwrap();
    assert_eq!(config.get_config().max_entries, 7);
    assert_eq!(config.get_config().tool_name, "coverage");
    assert!(config.get_config().save_before);
    assert_eq!(config.get_config().kill_grace_ms, 5_000);
}
