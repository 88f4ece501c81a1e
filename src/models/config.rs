use crate::encoding::TextEncoding;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for a loaded [`Settings`] value.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("{0} must not be empty")]
    EmptyDirectory(&'static str),

    #[error("excel.ext must list at least one extension")]
    NoExtensions,

    #[error("excel.ext entries must not be empty")]
    EmptyExtension,
}

/// Top-level configuration from `settings.yml`.
///
/// Read once at startup and immutable thereafter; every engine entry point
/// takes it (or one of its sections) by reference.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub excel: ExcelSettings,

    #[serde(default)]
    pub macros: MacrosSettings,
}

/// Where to find candidate workbooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcelSettings {
    /// Directory scanned (non-recursively) for workbooks.
    #[serde(default = "default_excel_dir")]
    pub dir: Utf8PathBuf,

    /// Filenames excluded from processing, matched exactly.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Workbook extensions to pick up, with or without the leading dot.
    #[serde(default = "default_extensions")]
    pub ext: Vec<String>,
}

impl Default for ExcelSettings {
    fn default() -> Self {
        Self {
            dir: default_excel_dir(),
            exclude: Vec::new(),
            ext: default_extensions(),
        }
    }
}

/// Where module text files live and how they are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacrosSettings {
    /// Root directory holding one subdirectory per workbook.
    #[serde(default = "default_macros_dir")]
    pub dir: Utf8PathBuf,

    /// Name the per-workbook subdirectory with the workbook extension.
    /// Needed when two workbooks differ only by extension.
    #[serde(default)]
    pub book_dir_ext: bool,

    /// Encoding of the module text files on disk.
    #[serde(default)]
    pub encoding: TextEncoding,

    /// Also extract free-standing class modules. Off by default; the
    /// pipeline historically treated them as out of scope.
    #[serde(default)]
    pub include_class_modules: bool,
}

impl Default for MacrosSettings {
    fn default() -> Self {
        Self {
            dir: default_macros_dir(),
            book_dir_ext: false,
            encoding: TextEncoding::default(),
            include_class_modules: false,
        }
    }
}

impl Settings {
    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.excel.dir.as_str().is_empty() {
            return Err(SettingsError::EmptyDirectory("excel.dir"));
        }
        if self.macros.dir.as_str().is_empty() {
            return Err(SettingsError::EmptyDirectory("macros.dir"));
        }
        if self.excel.ext.is_empty() {
            return Err(SettingsError::NoExtensions);
        }
        if self.excel.ext.iter().any(|e| e.trim_matches('.').is_empty()) {
            return Err(SettingsError::EmptyExtension);
        }
        Ok(())
    }
}

fn default_excel_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("books")
}

fn default_macros_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("macros")
}

fn default_extensions() -> Vec<String> {
    vec![".xlsm".to_string(), ".xlsb".to_string()]
}
