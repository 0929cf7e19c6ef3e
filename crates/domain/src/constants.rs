//! Domain constants

/// Feed cursor used when no genomics payload has been persisted yet.
pub const DEFAULT_FEED_CURSOR: &str = "1970-01-01T00:00:00-00:00";

/// Records per genomics batch when not configured.
pub const DEFAULT_GENOMICS_BATCH_SIZE: usize = 10;

/// Replays allowed before a retry entry is left for operators.
pub const DEFAULT_MAX_RETRY: i32 = 5;

/// Entries replayed per sweep when not configured.
pub const DEFAULT_SWEEP_LIMIT: usize = 500;

/// Volatile keys ignored when diffing partner payloads.
pub const DEFAULT_IGNORED_FIELDS: &[&str] =
    &["updatedAt", "updated_at", "lastModified", "timestamp", "occurred_at", "meta"];

/// Bus topic for genomics status events.
pub const TOPIC_GENOMICS_STATUS: &str = "genomics.status";

/// Bus topic for confirmed partner writes.
pub const TOPIC_PARTNER_SYNC_CONFIRMED: &str = "partner.sync.confirmed";
