//! SQLite participant directory

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cohortsync_core::ParticipantDirectory;
use cohortsync_domain::Result as DomainResult;
use rusqlite::params;
use tokio::task;

use super::manager::{map_join_error, map_storage_error, DbManager};

/// Subject to partner participant id mapping.
pub struct SqliteParticipantDirectory {
    db: Arc<DbManager>,
}

impl SqliteParticipantDirectory {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn lookup(&self, sql: &'static str, key: &str) -> DomainResult<Option<String>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<String>> {
            let conn = db.get_connection()?;
            conn.query_optional(sql, params![key], |row| row.get(0)).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ParticipantDirectory for SqliteParticipantDirectory {
    async fn partner_id_for_subject(&self, subject_id: &str) -> DomainResult<Option<String>> {
        self.lookup(
            "SELECT partner_participant_id FROM participant_directory WHERE subject_id = ?1",
            subject_id,
        )
        .await
    }

    async fn subject_for_partner_id(
        &self,
        partner_participant_id: &str,
    ) -> DomainResult<Option<String>> {
        self.lookup(
            "SELECT subject_id FROM participant_directory WHERE partner_participant_id = ?1",
            partner_participant_id,
        )
        .await
    }

    async fn link(&self, subject_id: &str, partner_participant_id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let subject_id = subject_id.to_string();
        let partner_participant_id = partner_participant_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO participant_directory (subject_id, partner_participant_id, updated_on)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (subject_id) DO UPDATE SET
                     partner_participant_id = excluded.partner_participant_id,
                     updated_on = excluded.updated_on",
                params![subject_id, partner_participant_id, Utc::now().timestamp_millis()],
            )
            .map_err(map_storage_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}
