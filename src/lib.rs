// vbasync - Synchronize VBA macros between Excel workbooks and text files
//
// This is the library crate containing the synchronization engine and data
// structures. The CLI front-end embeds it together with a platform
// automation gateway implementing the traits in [`host`].

pub mod config;
pub mod encoding;
pub mod host;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::SettingsManager;
pub use encoding::TextEncoding;
pub use models::{ExcelSettings, MacrosSettings, Settings};
pub use services::{BatchSummary, DocumentSession, HostSession, Mode, RunRequest};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
