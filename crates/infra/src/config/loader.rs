//! Configuration loader
//!
//! ## Loading Strategy
//! 1. `COHORTSYNC_CONFIG` names an explicit config file, if set
//! 2. Otherwise the standard locations are probed for a config file
//! 3. With no file at all, built-in defaults are used
//! 4. `COHORTSYNC_*` environment variables override individual fields
//!
//! Validation is left to [`Config::validate`] so callers decide when to fail.
//!
//! ## Environment Variables
//! - `COHORTSYNC_DB_PATH`, `COHORTSYNC_DB_POOL_SIZE`
//! - `COHORTSYNC_PARTNER_BASE_URL`, `COHORTSYNC_PARTNER_FEED_PATH`,
//!   `COHORTSYNC_PARTNER_TOKEN`, `COHORTSYNC_PARTNER_TIMEOUT_SECS`,
//!   `COHORTSYNC_PARTNER_MAX_ATTEMPTS`
//! - `COHORTSYNC_GENOMICS_BATCH_SIZE`, `COHORTSYNC_GENOMICS_FETCH_CRON`,
//!   `COHORTSYNC_GENOMICS_PUBLISH_CRON`
//! - `COHORTSYNC_RETRY_MAX`, `COHORTSYNC_RETRY_SWEEP_CRON`,
//!   `COHORTSYNC_RETRY_SWEEP_LIMIT`
//! - `COHORTSYNC_IGNORED_FIELDS` (comma separated)
//! - `COHORTSYNC_DISPATCH_PARTITIONS`, `COHORTSYNC_DISPATCH_CHANNEL_CAPACITY`
//! - `COHORTSYNC_LOG_LEVEL`, `COHORTSYNC_LOG_JSON`
//!
//! ## File Locations
//! The loader probes, in order, the working directory, its parent, and the
//! executable's directory for `cohortsync.toml`, `cohortsync.json`,
//! `config.toml` and `config.json`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cohortsync_domain::{CohortSyncError, Config, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["cohortsync.toml", "cohortsync.json", "config.toml", "config.json"];

/// Load configuration: file (explicit or probed) or defaults, then env overrides.
///
/// # Errors
/// Returns `CohortSyncError::Config` if a file exists but cannot be read or
/// parsed, or if an environment override has an invalid value.
pub fn load() -> Result<Config> {
    let explicit = std::env::var("COHORTSYNC_CONFIG").ok().filter(|p| !p.trim().is_empty());

    let mut config = match explicit {
        Some(path) => load_from_file(Some(PathBuf::from(path)))?,
        None => match probe_config_paths() {
            Some(path) => load_from_file(Some(path))?,
            None => {
                tracing::info!("No config file found; using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Build configuration from defaults and environment variables only.
///
/// `COHORTSYNC_DB_PATH` and `COHORTSYNC_PARTNER_BASE_URL` are required.
///
/// # Errors
/// Returns `CohortSyncError::Config` if a required variable is missing or
/// any variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    env_var("COHORTSYNC_DB_PATH")?;
    env_var("COHORTSYNC_PARTNER_BASE_URL")?;

    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// extension (`.toml` or `.json`); missing fields take their defaults.
///
/// # Errors
/// Returns `CohortSyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CohortSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CohortSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CohortSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Overwrite fields of `config` from any `COHORTSYNC_*` variables that are set.
///
/// # Errors
/// Returns `CohortSyncError::Config` naming the variable on a bad value.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(path) = env_opt("COHORTSYNC_DB_PATH") {
        config.database.path = PathBuf::from(path);
    }
    override_parsed("COHORTSYNC_DB_POOL_SIZE", &mut config.database.pool_size)?;

    if let Some(url) = env_opt("COHORTSYNC_PARTNER_BASE_URL") {
        config.partner.base_url = url;
    }
    if let Some(path) = env_opt("COHORTSYNC_PARTNER_FEED_PATH") {
        config.partner.feed_path = path;
    }
    if let Some(token) = env_opt("COHORTSYNC_PARTNER_TOKEN") {
        config.partner.api_token = Some(token);
    }
    override_parsed("COHORTSYNC_PARTNER_TIMEOUT_SECS", &mut config.partner.timeout_secs)?;
    override_parsed("COHORTSYNC_PARTNER_MAX_ATTEMPTS", &mut config.partner.max_attempts)?;

    override_parsed("COHORTSYNC_GENOMICS_BATCH_SIZE", &mut config.genomics.batch_size)?;
    if let Some(cron) = env_opt("COHORTSYNC_GENOMICS_FETCH_CRON") {
        config.genomics.fetch_cron = cron;
    }
    if let Some(cron) = env_opt("COHORTSYNC_GENOMICS_PUBLISH_CRON") {
        config.genomics.publish_cron = cron;
    }

    override_parsed("COHORTSYNC_RETRY_MAX", &mut config.retry.max_retry)?;
    if let Some(cron) = env_opt("COHORTSYNC_RETRY_SWEEP_CRON") {
        config.retry.sweep_cron = cron;
    }
    override_parsed("COHORTSYNC_RETRY_SWEEP_LIMIT", &mut config.retry.sweep_limit)?;

    if let Some(fields) = env_opt("COHORTSYNC_IGNORED_FIELDS") {
        config.change_detection.ignored_fields = fields
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect();
    }

    override_parsed("COHORTSYNC_DISPATCH_PARTITIONS", &mut config.dispatch.partitions)?;
    override_parsed(
        "COHORTSYNC_DISPATCH_CHANNEL_CAPACITY",
        &mut config.dispatch.channel_capacity,
    )?;

    if let Some(level) = env_opt("COHORTSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("COHORTSYNC_LOG_JSON", config.logging.json);

    Ok(())
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CohortSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CohortSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CohortSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    probe_dirs(&dirs)
}

fn probe_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        CohortSyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Non-empty environment variable, if set.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn override_parsed<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = env_opt(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| CohortSyncError::Config(format!("Invalid value for {key}: {e}")))?;
    }
    Ok(())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const OVERRIDE_VARS: [&str; 6] = [
        "COHORTSYNC_DB_PATH",
        "COHORTSYNC_PARTNER_BASE_URL",
        "COHORTSYNC_GENOMICS_BATCH_SIZE",
        "COHORTSYNC_RETRY_MAX",
        "COHORTSYNC_IGNORED_FIELDS",
        "COHORTSYNC_LOG_JSON",
    ];

    fn clear_env() {
        for key in OVERRIDE_VARS {
            std::env::remove_var(key);
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "yes", "on", "TRUE"] {
            std::env::set_var("TEST_COHORTSYNC_BOOL", value);
            assert!(env_bool("TEST_COHORTSYNC_BOOL", false), "{value}");
        }
        for value in ["0", "false", "no", "off"] {
            std::env::set_var("TEST_COHORTSYNC_BOOL", value);
            assert!(!env_bool("TEST_COHORTSYNC_BOOL", true), "{value}");
        }

        std::env::remove_var("TEST_COHORTSYNC_BOOL");
        assert!(env_bool("TEST_COHORTSYNC_BOOL", true));
        assert!(!env_bool("TEST_COHORTSYNC_BOOL", false));
    }

    #[test]
    fn test_load_from_env_requires_core_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, CohortSyncError::Config(ref m) if m.contains("COHORTSYNC_DB_PATH")));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("COHORTSYNC_DB_PATH", "/tmp/cohortsync-test.db");
        std::env::set_var("COHORTSYNC_PARTNER_BASE_URL", "https://partner.example");
        std::env::set_var("COHORTSYNC_GENOMICS_BATCH_SIZE", "25");
        std::env::set_var("COHORTSYNC_RETRY_MAX", "7");
        std::env::set_var("COHORTSYNC_IGNORED_FIELDS", "updated_at, etag ,");
        std::env::set_var("COHORTSYNC_LOG_JSON", "yes");

        let config = load_from_env().unwrap();
        clear_env();

        assert_eq!(config.database.path, PathBuf::from("/tmp/cohortsync-test.db"));
        assert_eq!(config.partner.base_url, "https://partner.example");
        assert_eq!(config.genomics.batch_size, 25);
        assert_eq!(config.retry.max_retry, 7);
        assert_eq!(config.change_detection.ignored_fields, vec!["updated_at", "etag"]);
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("COHORTSYNC_RETRY_MAX", "five");
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        clear_env();

        assert!(matches!(err, CohortSyncError::Config(ref m) if m.contains("COHORTSYNC_RETRY_MAX")));
    }

    #[test]
    fn test_load_from_file_toml_keeps_defaults_for_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "cohortsync.toml",
            r#"
[partner]
base_url = "https://registry.example/api"
api_token = "abc"

[retry]
max_retry = 3
"#,
        );

        let config = load_from_file(Some(path)).unwrap();

        assert_eq!(config.partner.base_url, "https://registry.example/api");
        assert_eq!(config.partner.api_token.as_deref(), Some("abc"));
        assert_eq!(config.retry.max_retry, 3);
        assert_eq!(config.genomics, Config::default().genomics);
    }

    #[test]
    fn test_load_from_file_json() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", r#"{"dispatch": {"partitions": 2}}"#);

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.dispatch.partitions, 2);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/cohortsync.toml")));
        assert!(matches!(result, Err(CohortSyncError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", r#"{ "this is": "not valid json" "#);

        assert!(load_from_file(Some(path)).is_err());
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_probe_prefers_earlier_directories_and_names() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(&second, "cohortsync.toml", "");
        let expected = write(&first, "config.json", "{}");

        let found = probe_dirs(&[first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(found, Some(expected));

        let preferred = write(&first, "cohortsync.toml", "");
        let found = probe_dirs(&[first.path().to_path_buf()]);
        assert_eq!(found, Some(preferred));
    }

    #[test]
    fn test_probe_returns_none_for_empty_dirs() {
        let dir = TempDir::new().unwrap();
        assert_eq!(probe_dirs(&[dir.path().to_path_buf()]), None);
    }
}
