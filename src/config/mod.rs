use crate::models::Settings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE_NAME: &str = "settings.yml";

/// Loads and saves the YAML settings file.
///
/// A missing file is not an error: defaults are used and a warning is
/// logged, so a fresh checkout works without any setup. A file that exists
/// but fails to parse or validate is an error; silently proceeding with
/// defaults would process the wrong directories.
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: Utf8PathBuf,
}

impl SettingsManager {
    /// Create a manager for the given settings file path.
    pub fn new<P: AsRef<Utf8Path>>(settings_path: P) -> Self {
        Self {
            settings_path: settings_path.as_ref().to_path_buf(),
        }
    }

    /// Load the settings file.
    ///
    /// # Returns
    /// The loaded and validated settings, or defaults if the file doesn't exist
    pub fn load(&self) -> Result<Settings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(Settings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: Settings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save the settings file.
    ///
    /// # Arguments
    /// * `settings` - The settings to save
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the settings file path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_manager() -> (SettingsManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join(SETTINGS_FILE_NAME)).unwrap();
        (SettingsManager::new(path), temp_dir)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (manager, _temp_dir) = create_test_manager();
        let settings = manager.load().unwrap();
        assert_eq!(settings.excel.dir, "books");
    }

    #[test]
    fn test_load_save_round_trip() {
        let (manager, _temp_dir) = create_test_manager();

        let mut settings = Settings::default();
        settings.excel.exclude.push("Template.xlsm".to_string());
        settings.macros.book_dir_ext = true;
        manager.save(&settings).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.excel.exclude, vec!["Template.xlsm"]);
        assert!(loaded.macros.book_dir_ext);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let (manager, _temp_dir) = create_test_manager();
        fs::write(manager.settings_path(), "excel: [not, a, mapping]").unwrap();
        assert!(manager.load().is_err());
    }

    #[test]
    fn test_invalid_settings_are_an_error() {
        let (manager, _temp_dir) = create_test_manager();
        fs::write(manager.settings_path(), "excel:\n  ext: []\n").unwrap();
        assert!(manager.load().is_err());
    }
}
