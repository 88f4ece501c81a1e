//! Data models for the synchronization engine.
//!
//! This module contains the configuration structures read from
//! `settings.yml`:
//! - [`Settings`]: The immutable top-level configuration value passed into
//!   the engine's entry points
//! - [`ExcelSettings`]: Where to find candidate workbooks and which to skip
//! - [`MacrosSettings`]: Where module text files live and how they are
//!   encoded
//!
//! # Architecture Note
//!
//! Settings are:
//! - **Serializable**: All structs derive `Serialize`/`Deserialize` for
//!   YAML persistence
//! - **Immutable**: Loaded and validated once at startup by
//!   [`SettingsManager`](crate::config::SettingsManager), then only read

pub mod config;

pub use config::{ExcelSettings, MacrosSettings, Settings, SettingsError};
