//! Configuration loading
//!
//! Loads [`cohortsync_domain::Config`] from a TOML/JSON file and
//! `COHORTSYNC_*` environment overrides.

pub mod loader;

// Re-export commonly used items
pub use loader::{apply_env_overrides, load, load_from_env, load_from_file, probe_config_paths};
