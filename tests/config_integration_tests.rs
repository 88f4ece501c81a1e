//! Integration tests for SettingsManager and settings file handling
//!
//! These tests verify:
//! - Settings loading and saving
//! - Default settings when the file is absent
//! - Validation of loaded settings
//! - Error handling for malformed YAML

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;
use vbasync::config::{SETTINGS_FILE_NAME, SettingsManager};
use vbasync::{Settings, TextEncoding};

fn create_test_manager() -> (TempDir, SettingsManager) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().join(SETTINGS_FILE_NAME)).unwrap();
    (temp_dir, SettingsManager::new(path))
}

#[test]
fn test_missing_settings_file_uses_defaults() {
    let (_temp_dir, manager) = create_test_manager();

    let settings = manager.load().unwrap();

    assert_eq!(settings.excel.dir, "books");
    assert_eq!(settings.excel.ext, vec![".xlsm", ".xlsb"]);
    assert!(settings.excel.exclude.is_empty());
    assert_eq!(settings.macros.dir, "macros");
    assert!(!settings.macros.book_dir_ext);
    assert_eq!(settings.macros.encoding, TextEncoding::Utf8);
}

#[test]
fn test_save_and_load_settings() {
    let (_temp_dir, manager) = create_test_manager();

    let mut settings = Settings::default();
    settings.excel.dir = "workbooks".into();
    settings.excel.exclude.push("Template.xlsm".to_string());
    settings.macros.book_dir_ext = true;
    settings.macros.encoding = TextEncoding::ShiftJis;

    manager.save(&settings).unwrap();
    let loaded = manager.load().unwrap();

    assert_eq!(loaded.excel.dir, "workbooks");
    assert_eq!(loaded.excel.exclude, vec!["Template.xlsm"]);
    assert!(loaded.macros.book_dir_ext);
    assert_eq!(loaded.macros.encoding, TextEncoding::ShiftJis);
}

#[test]
fn test_hand_written_settings_file() {
    let (_temp_dir, manager) = create_test_manager();

    let yaml = r#"
excel:
  dir: books
  exclude:
    - Master.xlsm
  ext:
    - .xlsm
macros:
  dir: macros
  book_dir_ext: true
  encoding: shift_jis
"#;
    fs::write(manager.settings_path(), yaml).unwrap();

    let settings = manager.load().unwrap();
    assert_eq!(settings.excel.exclude, vec!["Master.xlsm"]);
    assert_eq!(settings.excel.ext, vec![".xlsm"]);
    assert!(settings.macros.book_dir_ext);
    assert_eq!(settings.macros.encoding, TextEncoding::ShiftJis);
    // Unspecified fields fall back to defaults
    assert!(!settings.macros.include_class_modules);
}

#[test]
fn test_partial_settings_fill_defaults() {
    let (_temp_dir, manager) = create_test_manager();

    fs::write(manager.settings_path(), "macros:\n  encoding: utf-8\n").unwrap();

    let settings = manager.load().unwrap();
    assert_eq!(settings.excel.dir, "books");
    assert_eq!(settings.macros.encoding, TextEncoding::Utf8);
}

#[test]
fn test_invalid_yaml_is_rejected() {
    let (_temp_dir, manager) = create_test_manager();

    fs::write(manager.settings_path(), "excel: [not, a, mapping]").unwrap();
    assert!(manager.load().is_err());
}

#[test]
fn test_unknown_encoding_is_rejected() {
    let (_temp_dir, manager) = create_test_manager();

    fs::write(manager.settings_path(), "macros:\n  encoding: ebcdic\n").unwrap();
    assert!(manager.load().is_err());
}

#[test]
fn test_empty_extension_list_is_rejected() {
    let (_temp_dir, manager) = create_test_manager();

    fs::write(manager.settings_path(), "excel:\n  ext: []\n").unwrap();
    assert!(manager.load().is_err());
}

#[test]
fn test_saved_defaults_round_trip() {
    let (_temp_dir, manager) = create_test_manager();

    manager.save(&Settings::default()).unwrap();
    let loaded = manager.load().unwrap();
    assert_eq!(loaded.excel.dir, "books");
    assert_eq!(loaded.macros.dir, "macros");
}
