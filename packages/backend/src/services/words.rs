use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::{to_millis, with_timeout, ProgressStore};
use crate::services::progress::{validate_id, ProgressError};

pub const MAX_WORDS_PER_REQUEST: usize = 500;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    pub id: Option<String>,
    pub word: Option<String>,
}

/// Upsert word identities into the local catalog so never-reviewed words
/// become visible to the selector. Returns the number of entries written.
pub async fn register_words(
    store: &ProgressStore,
    entries: &[WordEntry],
    now: DateTime<Utc>,
) -> Result<usize, ProgressError> {
    if entries.is_empty() {
        return Err(ProgressError::Validation("words must not be empty".to_string()));
    }
    if entries.len() > MAX_WORDS_PER_REQUEST {
        return Err(ProgressError::Validation(format!(
            "at most {MAX_WORDS_PER_REQUEST} words per request"
        )));
    }

    let mut validated = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = validate_id("id", entry.id.as_deref())?;
        let word = entry
            .word
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string);
        validated.push((id, word));
    }

    let written = with_timeout(store.store_timeout(), upsert_words(store, &validated, now)).await?;
    tracing::info!(count = written, "words registered");
    Ok(written)
}

async fn upsert_words(
    store: &ProgressStore,
    words: &[(String, Option<String>)],
    now: DateTime<Utc>,
) -> Result<usize, ProgressError> {
    let mut tx = store.pool().begin().await?;
    for (id, word) in words {
        sqlx::query(
            r#"
            INSERT INTO "words" ("id", "word", "created_at") VALUES (?1, ?2, ?3)
            ON CONFLICT("id") DO UPDATE SET "word" = COALESCE(excluded."word", "words"."word")
            "#,
        )
        .bind(id)
        .bind(word)
        .bind(to_millis(now))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(words.len())
}
