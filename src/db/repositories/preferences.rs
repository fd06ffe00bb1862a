use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::audio::{AudioPreference, PreferenceStore};
use crate::db::{helpers::parse_datetime, models::StoredPreference, Database};

fn row_to_preference(row: &Row) -> Result<StoredPreference> {
    let preference: String = row.get("preference")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(StoredPreference {
        cut_id: row.get("cut_id")?,
        segment_key: row.get("segment_key")?,
        preference: preference.parse()?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn get_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
    ) -> Result<Option<AudioPreference>> {
        let cut_id = cut_id.to_string();
        let segment_key = segment_key.to_string();
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT preference FROM audio_preferences
                     WHERE cut_id = ?1 AND segment_key = ?2",
                    params![cut_id, segment_key],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to load audio preference")?;
            raw.map(|value| value.parse()).transpose()
        })
        .await
    }

    /// Insert or replace the choice for one line.
    pub async fn upsert_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
        preference: AudioPreference,
    ) -> Result<()> {
        let cut_id = cut_id.to_string();
        let segment_key = segment_key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO audio_preferences (cut_id, segment_key, preference, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(cut_id, segment_key)
                 DO UPDATE SET preference = excluded.preference, updated_at = excluded.updated_at",
                params![cut_id, segment_key, preference.as_str(), Utc::now().to_rfc3339()],
            )
            .context("failed to save audio preference")?;
            Ok(())
        })
        .await
    }

    pub async fn list_preferences(&self, cut_id: &str) -> Result<Vec<StoredPreference>> {
        let cut_id = cut_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT cut_id, segment_key, preference, updated_at
                 FROM audio_preferences
                 WHERE cut_id = ?1
                 ORDER BY segment_key ASC",
            )?;
            let mut rows = stmt.query(params![cut_id])?;
            let mut preferences = Vec::new();
            while let Some(row) = rows.next()? {
                preferences.push(row_to_preference(row)?);
            }
            Ok(preferences)
        })
        .await
    }

    /// Returns how many rows were removed.
    pub async fn clear_preferences(&self, cut_id: &str) -> Result<usize> {
        let cut_id = cut_id.to_string();
        self.execute(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM audio_preferences WHERE cut_id = ?1",
                    params![cut_id],
                )
                .context("failed to clear audio preferences")?;
            Ok(removed)
        })
        .await
    }
}

#[async_trait]
impl PreferenceStore for Database {
    async fn stored_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
    ) -> Result<Option<AudioPreference>> {
        self.get_preference(cut_id, segment_key).await
    }

    async fn set_stored_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
        preference: AudioPreference,
    ) -> Result<()> {
        self.upsert_preference(cut_id, segment_key, preference).await
    }
}
