use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use wordsprout_algo::AnswerOutcome;

use crate::db::{to_millis, with_timeout, ProgressStore};
use crate::services::progress::{validate_id, AnswerEvent, ProgressError};

/// Append one `<mode>_attempt` row. Runs inside the caller's transaction.
pub(crate) async fn insert_attempt(
    conn: &mut SqliteConnection,
    event: &AnswerEvent,
    outcome: &AnswerOutcome,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "activity_log"
          ("id","learner_id","word_id","activity_type","mode","is_correct",
           "response_time_seconds","points_earned","new_level","success_rate","created_at")
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&event.learner_id)
    .bind(&event.word_id)
    .bind(event.mode.activity_type())
    .bind(event.mode.as_str())
    .bind(event.is_correct)
    .bind(event.response_time_seconds)
    .bind(i64::from(outcome.points_earned))
    .bind(i64::from(outcome.record.current_level))
    .bind(outcome.record.success_rate)
    .bind(to_millis(now))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeStats {
    pub attempts: u32,
    pub correct: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub attempts: u32,
    pub correct: u32,
    /// Percentage of correct attempts, 0 when there were none
    pub accuracy: f64,
    pub words_studied: u32,
    pub points_earned: u32,
    pub by_mode: BTreeMap<String, ModeStats>,
}

/// Aggregate one learner's attempts over a UTC calendar day.
pub async fn daily_stats(
    store: &ProgressStore,
    learner_id: &str,
    date: NaiveDate,
) -> Result<DailyStats, ProgressError> {
    let learner_id = validate_id("learnerId", Some(learner_id))?;
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let end = start
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| ProgressError::Validation("date out of range".to_string()))?;

    with_timeout(
        store.store_timeout(),
        fetch_daily_stats(store, learner_id, date, start, end),
    )
    .await
}

async fn fetch_daily_stats(
    store: &ProgressStore,
    learner_id: String,
    date: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<DailyStats, ProgressError> {
    let rows = sqlx::query(
        r#"
        SELECT "mode",
               COUNT(*) AS "attempts",
               COALESCE(SUM("is_correct"), 0) AS "correct",
               COALESCE(SUM("points_earned"), 0) AS "points"
        FROM "activity_log"
        WHERE "learner_id" = ?1 AND "created_at" >= ?2 AND "created_at" < ?3
        GROUP BY "mode"
        "#,
    )
    .bind(&learner_id)
    .bind(to_millis(start))
    .bind(to_millis(end))
    .fetch_all(store.pool())
    .await?;

    let words_studied: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT "word_id") FROM "activity_log"
        WHERE "learner_id" = ?1 AND "created_at" >= ?2 AND "created_at" < ?3
        "#,
    )
    .bind(&learner_id)
    .bind(to_millis(start))
    .bind(to_millis(end))
    .fetch_one(store.pool())
    .await?;

    let mut stats = DailyStats {
        date,
        attempts: 0,
        correct: 0,
        accuracy: 0.0,
        words_studied: saturate(words_studied),
        points_earned: 0,
        by_mode: BTreeMap::new(),
    };

    for row in rows {
        let mode: String = row.try_get("mode")?;
        let attempts = saturate(row.try_get("attempts")?);
        let correct = saturate(row.try_get("correct")?);
        let points = saturate(row.try_get("points")?);

        stats.attempts += attempts;
        stats.correct += correct;
        stats.points_earned += points;
        stats.by_mode.insert(mode, ModeStats { attempts, correct });
    }

    stats.accuracy = wordsprout_algo::success_rate(stats.correct, stats.attempts);
    Ok(stats)
}

fn saturate(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
