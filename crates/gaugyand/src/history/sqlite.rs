//! SQLite history store.
//!
//! Timestamps are kept as UTC microseconds so ordering is numeric; rows
//! sharing a timestamp fall back to insertion order.

use super::{HistoryStore, StoreError};
use crate::db::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gaugyan_common::{AnalysisRecord, CombinedResult, ScoreResult, TraitSet, UserId};
use rusqlite::params;
use tracing::{debug, info};

pub struct SqliteHistoryStore {
    db: Database,
}

impl SqliteHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

struct Row {
    id: String,
    image: String,
    timestamp_us: i64,
    body_length: f64,
    chest_width: f64,
    height_at_withers: f64,
    rump_angle: f64,
    udder_shape: String,
    atc_score: f64,
    salient_traits: String,
}

impl Row {
    fn into_record(self) -> Result<AnalysisRecord, StoreError> {
        let timestamp = DateTime::<Utc>::from_timestamp_micros(self.timestamp_us).ok_or_else(|| {
            StoreError::Corrupt {
                id: self.id.clone(),
                reason: format!("timestamp {} out of range", self.timestamp_us),
            }
        })?;

        Ok(AnalysisRecord::new(
            self.id,
            self.image,
            timestamp,
            CombinedResult {
                traits: TraitSet {
                    body_length: self.body_length,
                    chest_width: self.chest_width,
                    height_at_withers: self.height_at_withers,
                    rump_angle: self.rump_angle,
                    udder_shape: self.udder_shape,
                },
                score: ScoreResult {
                    atc_score: self.atc_score,
                    salient_traits: self.salient_traits,
                },
            },
        ))
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, user_id: &UserId, record: &AnalysisRecord) -> Result<(), StoreError> {
        let user = user_id.as_str().to_string();
        let r = record.clone();

        self.db
            .call(move |conn| {
                let traits = &r.result.traits;
                let score = &r.result.score;
                conn.execute(
                    "INSERT INTO analyses (id, user_id, image, timestamp_us, body_length, chest_width,
                        height_at_withers, rump_angle, udder_shape, atc_score, salient_traits)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        r.id,
                        user,
                        r.image,
                        r.timestamp.timestamp_micros(),
                        traits.body_length,
                        traits.chest_width,
                        traits.height_at_withers,
                        traits.rump_angle,
                        traits.udder_shape,
                        score.atc_score,
                        score.salient_traits,
                    ],
                )
            })
            .await?;

        debug!("Appended analysis {} for user {}", record.id, user_id);
        Ok(())
    }

    async fn list_all(&self, user_id: &UserId) -> Result<Vec<AnalysisRecord>, StoreError> {
        let user = user_id.as_str().to_string();
        let rows: Vec<Row> = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, image, timestamp_us, body_length, chest_width, height_at_withers,
                            rump_angle, udder_shape, atc_score, salient_traits
                     FROM analyses
                     WHERE user_id = ?1
                     ORDER BY timestamp_us DESC, seq DESC",
                )?;
                let rows = stmt.query_map(params![user], |row| {
                    Ok(Row {
                        id: row.get(0)?,
                        image: row.get(1)?,
                        timestamp_us: row.get(2)?,
                        body_length: row.get(3)?,
                        chest_width: row.get(4)?,
                        height_at_withers: row.get(5)?,
                        rump_angle: row.get(6)?,
                        udder_shape: row.get(7)?,
                        atc_score: row.get(8)?,
                        salient_traits: row.get(9)?,
                    })
                })?;
                rows.collect()
            })
            .await?;

        rows.into_iter().map(Row::into_record).collect()
    }

    async fn clear(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let user = user_id.as_str().to_string();
        let removed = self
            .db
            .call(move |conn| conn.execute("DELETE FROM analyses WHERE user_id = ?1", params![user]))
            .await?;

        info!("Cleared {} history records for user {}", removed, user_id);
        Ok(removed)
    }
}
