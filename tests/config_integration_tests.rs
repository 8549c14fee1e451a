//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Default ignore list generation and persistence
//! - Custom ignore file locations
//! - Legacy JSON ignore files
//! - Settings loading with partial files
//! - Invalid files surface as errors

use addon_merger::{ConfigManager, IgnoreList, MergeSettings, OutputLayout};
use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
}

#[test]
fn test_config_dir_created_if_missing() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("Addon Merger Data");

    let manager = ConfigManager::new(&nested).unwrap();

    assert!(nested.is_dir());
    assert_eq!(manager.config_dir(), &nested);
}

#[test]
fn test_default_ignore_list_written_and_reloaded() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let created = manager.load_ignore_list().unwrap();
    let content = fs::read_to_string(manager.ignore_list_path()).unwrap();
    let reloaded = manager.load_ignore_list().unwrap();

    assert!(content.contains(".git"));
    assert!(content.contains("_MERGED"));
    assert_eq!(created, reloaded);
    assert_eq!(reloaded.iter().collect::<Vec<_>>(), vec![".git", "_MERGED"]);
}

#[test]
fn test_custom_ignore_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let custom = config_path.join("lists").join("server-ignore.yaml");

    let manager = ConfigManager::new(&config_path)
        .unwrap()
        .with_ignore_file(&custom);
    manager
        .save_ignore_list(&IgnoreList::new(["wiremod", "ulib"]))
        .unwrap();

    let loaded = manager.load_ignore_list().unwrap();

    assert!(custom.is_file());
    assert!(loaded.contains("wiremod"));
    assert!(loaded.contains("ulib"));
    assert!(!config_path.join("ignore.yaml").exists());
}

#[test]
fn test_legacy_json_ignore_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let legacy = config_path.join("ignore.json");
    fs::write(&legacy, r#"[".git","_MERGED","darkrp_modification"]"#).unwrap();

    let manager = ConfigManager::new(&config_path)
        .unwrap()
        .with_ignore_file(&legacy);
    let loaded = manager.load_ignore_list().unwrap();

    assert_eq!(loaded.len(), 3);
    assert!(loaded.contains("darkrp_modification"));
}

#[test]
fn test_invalid_ignore_file_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.ignore_list_path(), "names: {not: a list}").unwrap();

    let err = manager.load_ignore_list().unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to parse ignore list"));
}

#[test]
fn test_partial_settings_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(
        manager.settings_path(),
        "Addons Per Worker: 8\nOverwrite Conflicts: true\nLayout: flatten\n",
    )
    .unwrap();

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.addons_per_worker, 8);
    assert!(settings.overwrite_conflicts);
    assert!(!settings.log);
    assert_eq!(settings.layout, OutputLayout::Flatten);
    assert_eq!(settings.log_dir, "logs");
}

#[test]
fn test_save_and_load_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = MergeSettings {
        max_workers: 6,
        log: true,
        log_dir: "merge-logs".to_string(),
        ..MergeSettings::default()
    };
    manager.save_settings(&settings).unwrap();

    let loaded = manager.load_settings().unwrap();
    assert_eq!(loaded, settings);
}
