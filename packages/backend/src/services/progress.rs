use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection};
use wordsprout_algo::{apply_answer, sanitize, AnswerInput, AnswerOutcome, ProgressRecord};

use crate::db::{from_millis, to_millis, truncate_to_millis, with_timeout, ProgressStore, StoreTimeout};
use crate::services::activity;

const MAX_ID_LEN: usize = 128;

const PROGRESS_COLUMNS: &str = r#"
    "learner_id","word_id","current_level","ease_factor","interval_hours",
    "last_reviewed","next_review","consecutive_correct","total_attempts","total_correct",
    "success_rate","first_learned","is_learned","version"
"#;

/// Learning activity that produced an answer. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningMode {
    Flashcards,
    Quiz,
    Spelling,
    #[default]
    Review,
}

impl LearningMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flashcards" | "flashcard" => Some(Self::Flashcards),
            "quiz" => Some(Self::Quiz),
            "spelling" => Some(Self::Spelling),
            "review" => Some(Self::Review),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flashcards => "flashcards",
            Self::Quiz => "quiz",
            Self::Spelling => "spelling",
            Self::Review => "review",
        }
    }

    pub fn activity_type(&self) -> String {
        format!("{}_attempt", self.as_str())
    }
}

/// Answer event as submitted by a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub learner_id: Option<String>,
    pub word_id: Option<String>,
    pub is_correct: Option<bool>,
    pub response_time_seconds: Option<f64>,
    pub mode: Option<String>,
    /// Older clients send the mode under this key
    pub learning_mode: Option<String>,
    pub expected_version: Option<i64>,
}

/// A validated answer event.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerEvent {
    pub learner_id: String,
    pub word_id: String,
    pub is_correct: bool,
    pub response_time_seconds: Option<f64>,
    pub mode: LearningMode,
    /// Reject the answer unless the stored record is at this version (0 = no record)
    pub expected_version: Option<i64>,
}

impl AnswerEvent {
    pub fn new(learner_id: &str, word_id: &str, is_correct: bool) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            word_id: word_id.to_string(),
            is_correct,
            response_time_seconds: None,
            mode: LearningMode::default(),
            expected_version: None,
        }
    }

    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time_seconds = Some(seconds);
        self
    }

    pub fn with_mode(mut self, mode: LearningMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    fn to_input(&self) -> AnswerInput {
        AnswerInput {
            learner_id: self.learner_id.clone(),
            word_id: self.word_id.clone(),
            is_correct: self.is_correct,
            response_time_seconds: self.response_time_seconds,
        }
    }
}

impl TryFrom<AnswerPayload> for AnswerEvent {
    type Error = ProgressError;

    fn try_from(raw: AnswerPayload) -> Result<Self, Self::Error> {
        let learner_id = validate_id("learnerId", raw.learner_id.as_deref())?;
        let word_id = validate_id("wordId", raw.word_id.as_deref())?;
        let is_correct = raw
            .is_correct
            .ok_or_else(|| ProgressError::Validation("isCorrect is required".to_string()))?;

        if let Some(secs) = raw.response_time_seconds {
            if !sanitize::is_valid_response_time(secs) {
                return Err(ProgressError::Validation(
                    "responseTimeSeconds must be a positive number".to_string(),
                ));
            }
        }

        let mode_key = match (raw.mode.as_deref(), raw.learning_mode.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(ProgressError::Validation(
                    "send either mode or learningMode, not both".to_string(),
                ))
            }
            (mode, learning_mode) => mode.or(learning_mode),
        };

        let mode = match mode_key {
            None => LearningMode::default(),
            Some(value) => LearningMode::parse(value).ok_or_else(|| {
                ProgressError::Validation(
                    "mode must be one of: flashcards, quiz, spelling, review".to_string(),
                )
            })?,
        };

        if raw.expected_version.is_some_and(|v| v < 0) {
            return Err(ProgressError::Validation(
                "expectedVersion must not be negative".to_string(),
            ));
        }

        Ok(Self {
            learner_id,
            word_id,
            is_correct,
            response_time_seconds: raw.response_time_seconds,
            mode,
            expected_version: raw.expected_version,
        })
    }
}

pub fn validate_id(field: &str, value: Option<&str>) -> Result<String, ProgressError> {
    let trimmed = value.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return Err(ProgressError::Validation(format!("{field} is required")));
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(ProgressError::Validation(format!(
            "{field} exceeds maximum length of {MAX_ID_LEN}"
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Timeout(#[from] StoreTimeout),
    #[error(transparent)]
    Sql(sqlx::Error),
}

impl ProgressError {
    /// Whether the caller may resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict(_) | Self::Timeout(_) => true,
            Self::Sql(err) => is_unavailable(err),
            Self::Validation(_) => false,
        }
    }
}

impl From<sqlx::Error> for ProgressError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::Conflict("progress record was created concurrently".to_string());
            }
            // SQLITE_BUSY and its extended codes
            if db
                .code()
                .is_some_and(|code| code == "5" || code == "517" || code == "261")
            {
                return Self::Conflict("progress record is being updated".to_string());
            }
        }
        Self::Sql(err)
    }
}

pub fn is_unavailable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

/// Result of a persisted answer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAnswer {
    pub progress: ProgressRecord,
    pub points_earned: u32,
    pub became_learned: bool,
    pub mode: LearningMode,
}

pub async fn get_progress(
    store: &ProgressStore,
    learner_id: &str,
    word_id: &str,
) -> Result<Option<ProgressRecord>, ProgressError> {
    let learner_id = validate_id("learnerId", Some(learner_id))?;
    let word_id = validate_id("wordId", Some(word_id))?;

    with_timeout(store.store_timeout(), async {
        let mut conn = store.pool().acquire().await?;
        let record = fetch_progress(&mut *conn, &learner_id, &word_id).await?;
        Ok::<_, ProgressError>(record)
    })
    .await
}

/// Apply one answer: read the prior record, run the scheduler, and persist
/// the new record together with its activity entry in one transaction.
///
/// The update is conditional on the version that was read, so a concurrent
/// submit for the same pair fails with [`ProgressError::Conflict`] instead of
/// applying its deltas twice.
pub async fn record_answer(
    store: &ProgressStore,
    event: &AnswerEvent,
    now: DateTime<Utc>,
) -> Result<RecordedAnswer, ProgressError> {
    let now = truncate_to_millis(now);
    let result = with_timeout(store.store_timeout(), record_answer_tx(store, event, now)).await;

    match &result {
        Ok(recorded) => tracing::debug!(
            learner_id = %event.learner_id,
            word_id = %event.word_id,
            mode = event.mode.as_str(),
            level = recorded.progress.current_level,
            interval_hours = recorded.progress.interval_hours,
            points = recorded.points_earned,
            "answer recorded"
        ),
        Err(err) => tracing::warn!(
            learner_id = %event.learner_id,
            word_id = %event.word_id,
            error = %err,
            retryable = err.is_retryable(),
            "answer not recorded"
        ),
    }

    result
}

async fn record_answer_tx(
    store: &ProgressStore,
    event: &AnswerEvent,
    now: DateTime<Utc>,
) -> Result<RecordedAnswer, ProgressError> {
    let mut tx = store.pool().begin().await?;

    let prior = fetch_progress(&mut *tx, &event.learner_id, &event.word_id).await?;

    if let Some(expected) = event.expected_version {
        let current = prior.as_ref().map_or(0, |p| p.version);
        if current != expected {
            return Err(ProgressError::Conflict(format!(
                "expected version {expected}, found {current}"
            )));
        }
    }

    let outcome = apply_answer(prior.as_ref(), &event.to_input(), now);

    match &prior {
        None => insert_progress(&mut *tx, &outcome.record, now).await?,
        Some(previous) => {
            let updated = update_progress(&mut *tx, &outcome.record, previous.version, now).await?;
            if !updated {
                return Err(ProgressError::Conflict(
                    "progress record changed while the answer was applied".to_string(),
                ));
            }
        }
    }

    activity::insert_attempt(&mut *tx, event, &outcome, now).await?;

    tx.commit().await?;

    let AnswerOutcome {
        record,
        points_earned,
        became_learned,
    } = outcome;

    Ok(RecordedAnswer {
        progress: record,
        points_earned,
        became_learned,
        mode: event.mode,
    })
}

pub(crate) async fn fetch_progress(
    conn: &mut SqliteConnection,
    learner_id: &str,
    word_id: &str,
) -> Result<Option<ProgressRecord>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {PROGRESS_COLUMNS} FROM "progress" WHERE "learner_id" = ?1 AND "word_id" = ?2 LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(learner_id)
        .bind(word_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_progress_row).transpose()
}

async fn insert_progress(
    conn: &mut SqliteConnection,
    record: &ProgressRecord,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query::<Sqlite>(
        r#"
        INSERT INTO "progress"
          ("learner_id","word_id","current_level","ease_factor","interval_hours",
           "last_reviewed","next_review","consecutive_correct","total_attempts","total_correct",
           "success_rate","first_learned","is_learned","version","created_at","updated_at")
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
        "#,
    )
    .bind(&record.learner_id)
    .bind(&record.word_id)
    .bind(i64::from(record.current_level))
    .bind(record.ease_factor)
    .bind(i64::from(record.interval_hours))
    .bind(to_millis(record.last_reviewed))
    .bind(to_millis(record.next_review))
    .bind(i64::from(record.consecutive_correct))
    .bind(i64::from(record.total_attempts))
    .bind(i64::from(record.total_correct))
    .bind(record.success_rate)
    .bind(to_millis(record.first_learned))
    .bind(record.is_learned)
    .bind(record.version)
    .bind(to_millis(now))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Returns `false` when the stored version no longer matches `prior_version`.
async fn update_progress(
    conn: &mut SqliteConnection,
    record: &ProgressRecord,
    prior_version: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query::<Sqlite>(
        r#"
        UPDATE "progress" SET
          "current_level" = ?3,
          "ease_factor" = ?4,
          "interval_hours" = ?5,
          "last_reviewed" = ?6,
          "next_review" = ?7,
          "consecutive_correct" = ?8,
          "total_attempts" = ?9,
          "total_correct" = ?10,
          "success_rate" = ?11,
          "is_learned" = ?12,
          "version" = ?13,
          "updated_at" = ?14
        WHERE "learner_id" = ?1 AND "word_id" = ?2 AND "version" = ?15
        "#,
    )
    .bind(&record.learner_id)
    .bind(&record.word_id)
    .bind(i64::from(record.current_level))
    .bind(record.ease_factor)
    .bind(i64::from(record.interval_hours))
    .bind(to_millis(record.last_reviewed))
    .bind(to_millis(record.next_review))
    .bind(i64::from(record.consecutive_correct))
    .bind(i64::from(record.total_attempts))
    .bind(i64::from(record.total_correct))
    .bind(record.success_rate)
    .bind(record.is_learned)
    .bind(record.version)
    .bind(to_millis(now))
    .bind(prior_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, sqlx::Error> {
    Ok(ProgressRecord {
        learner_id: row.try_get("learner_id")?,
        word_id: row.try_get("word_id")?,
        current_level: get_u32(row, "current_level")?,
        ease_factor: row.try_get("ease_factor")?,
        interval_hours: get_u32(row, "interval_hours")?,
        last_reviewed: from_millis(row.try_get("last_reviewed")?)?,
        next_review: from_millis(row.try_get("next_review")?)?,
        consecutive_correct: get_u32(row, "consecutive_correct")?,
        total_attempts: get_u32(row, "total_attempts")?,
        total_correct: get_u32(row, "total_correct")?,
        success_rate: row.try_get("success_rate")?,
        first_learned: from_millis(row.try_get("first_learned")?)?,
        is_learned: row.try_get("is_learned")?,
        version: row.try_get("version")?,
    })
}

pub(crate) fn get_u32(row: &SqliteRow, column: &str) -> Result<u32, sqlx::Error> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
