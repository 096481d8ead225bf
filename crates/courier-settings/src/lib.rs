//! # courier-settings
//!
//! Configuration for the Courier push server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CourierSettings::default()`]
//! 2. **Settings file**: `~/.courier/settings.json` or an explicit path (deep-merged over defaults)
//! 3. **Environment variables**: `COURIER_*` overrides (highest priority)
//!
//! The listening port is the only value the server core requires; the rest
//! tune the send queue, the admin surface, and logging.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
