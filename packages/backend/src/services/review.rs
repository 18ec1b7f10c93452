use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;

use crate::db::{from_millis, to_millis, with_timeout, ProgressStore};
use crate::services::progress::{get_u32, validate_id, ProgressError};

pub const DEFAULT_REVIEW_LIMIT: u32 = 20;
pub const MAX_REVIEW_LIMIT: u32 = 100;

/// A word eligible for review right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueWord {
    pub word_id: String,
    /// Display text, when the word is in the catalog
    pub word: Option<String>,
    /// `None` for never-reviewed words
    pub next_review: Option<DateTime<Utc>>,
    /// `None` for never-reviewed words
    pub current_level: Option<u32>,
    pub is_new: bool,
}

/// Words the learner should review at `now`: catalog words without a
/// progress record first, then records with `next_review <= now` from most
/// overdue, ties broken by word id. Read-only.
pub async fn select_due_words(
    store: &ProgressStore,
    learner_id: &str,
    limit: u32,
    now: DateTime<Utc>,
) -> Result<Vec<DueWord>, ProgressError> {
    let learner_id = validate_id("learnerId", Some(learner_id))?;
    let limit = limit.clamp(1, MAX_REVIEW_LIMIT);

    let words = with_timeout(
        store.store_timeout(),
        fetch_due_words(store, &learner_id, limit, now),
    )
    .await?;

    tracing::debug!(learner_id = %learner_id, limit, count = words.len(), "due words selected");
    Ok(words)
}

async fn fetch_due_words(
    store: &ProgressStore,
    learner_id: &str,
    limit: u32,
    now: DateTime<Utc>,
) -> Result<Vec<DueWord>, ProgressError> {
    let rows = sqlx::query(
        r#"
        SELECT w."id" AS "word_id", w."word" AS "word",
               NULL AS "next_review", NULL AS "current_level", 1 AS "is_new"
        FROM "words" w
        WHERE NOT EXISTS (
            SELECT 1 FROM "progress" p WHERE p."learner_id" = ?1 AND p."word_id" = w."id"
        )
        UNION ALL
        SELECT p."word_id" AS "word_id", w."word" AS "word",
               p."next_review" AS "next_review", p."current_level" AS "current_level", 0 AS "is_new"
        FROM "progress" p
        LEFT JOIN "words" w ON w."id" = p."word_id"
        WHERE p."learner_id" = ?1 AND p."next_review" <= ?2
        ORDER BY "next_review" ASC NULLS FIRST, "word_id" ASC
        LIMIT ?3
        "#,
    )
    .bind(learner_id)
    .bind(to_millis(now))
    .bind(i64::from(limit))
    .fetch_all(store.pool())
    .await?;

    let mut words = Vec::with_capacity(rows.len());
    for row in rows {
        let next_review: Option<i64> = row.try_get("next_review")?;
        let current_level: Option<i64> = row.try_get("current_level")?;
        words.push(DueWord {
            word_id: row.try_get("word_id")?,
            word: row.try_get("word")?,
            next_review: next_review.map(from_millis).transpose()?,
            current_level: current_level.map(level_to_u32).transpose()?,
            is_new: row.try_get::<i64, _>("is_new")? != 0,
        });
    }
    Ok(words)
}

fn level_to_u32(level: i64) -> Result<u32, sqlx::Error> {
    u32::try_from(level).map_err(|e| sqlx::Error::ColumnDecode {
        index: "current_level".to_string(),
        source: Box::new(e),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterySummary {
    pub tracked_words: u32,
    pub learned_words: u32,
    pub due_words: u32,
    pub average_success_rate: f64,
    pub total_points: u64,
}

pub async fn mastery_summary(
    store: &ProgressStore,
    learner_id: &str,
    now: DateTime<Utc>,
) -> Result<MasterySummary, ProgressError> {
    let learner_id = validate_id("learnerId", Some(learner_id))?;
    with_timeout(
        store.store_timeout(),
        fetch_mastery_summary(store, &learner_id, now),
    )
    .await
}

async fn fetch_mastery_summary(
    store: &ProgressStore,
    learner_id: &str,
    now: DateTime<Utc>,
) -> Result<MasterySummary, ProgressError> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS "tracked",
               COALESCE(SUM("is_learned"), 0) AS "learned",
               COALESCE(SUM(CASE WHEN "next_review" <= ?2 THEN 1 ELSE 0 END), 0) AS "due",
               COALESCE(AVG("success_rate"), 0.0) AS "avg_rate"
        FROM "progress"
        WHERE "learner_id" = ?1
        "#,
    )
    .bind(learner_id)
    .bind(to_millis(now))
    .fetch_one(store.pool())
    .await?;

    let total_points: i64 = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM("points_earned"), 0) FROM "activity_log" WHERE "learner_id" = ?1"#,
    )
    .bind(learner_id)
    .fetch_one(store.pool())
    .await?;

    Ok(MasterySummary {
        tracked_words: get_u32(&row, "tracked")?,
        learned_words: get_u32(&row, "learned")?,
        due_words: get_u32(&row, "due")?,
        average_success_rate: row.try_get("avg_rate")?,
        total_points: u64::try_from(total_points).unwrap_or(0),
    })
}
