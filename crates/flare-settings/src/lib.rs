//! # flare-settings
//!
//! Configuration for the flare broadcaster, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`FlareSettings::default()`]
//! 2. **Settings file**: a JSON file deep-merged over the defaults
//! 3. **Environment variables**: `FLARE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, apply_overrides_from, deep_merge, load_settings};
pub use types::{FlareSettings, LoggingSettings, ServerSettings};
