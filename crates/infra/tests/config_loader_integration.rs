//! Integration tests for configuration loading from files.

use cohortsync_infra::config;
use tempfile::TempDir;

/// A full TOML file round-trips into a valid configuration.
#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("cohortsync.toml");
    std::fs::write(
        &path,
        r#"
[database]
path = "/var/lib/cohortsync/state.db"
pool_size = 4

[partner]
base_url = "https://registry.example/api/v2"
feed_path = "genomics/status"
timeout_secs = 10
max_attempts = 2

[genomics]
batch_size = 50
fetch_cron = "0 */10 * * * *"
publish_cron = "15 */5 * * * *"

[retry]
max_retry = 8
sweep_cron = "0 30 * * * *"
sweep_limit = 200

[change_detection]
ignored_fields = ["updated_at"]

[dispatch]
partitions = 8
channel_capacity = 64

[logging]
level = "debug"
json = true
"#,
    )
    .expect("write config");

    let config = config::load_from_file(Some(path)).expect("config loads");
    config.validate().expect("config is valid");

    assert_eq!(config.database.pool_size, 4);
    assert_eq!(config.partner.max_attempts, 2);
    assert_eq!(config.genomics.batch_size, 50);
    assert_eq!(config.retry.max_retry, 8);
    assert_eq!(config.change_detection.ignored_fields, vec!["updated_at"]);
    assert_eq!(config.dispatch.partitions, 8);
    assert!(config.logging.json);
}

/// Invalid cron expressions load but fail validation.
#[test]
fn test_invalid_cron_fails_validation() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"retry": {"sweep_cron": "every hour"}}"#).expect("write config");

    let config = config::load_from_file(Some(path)).expect("config loads");
    assert!(config.validate().is_err());
}
