use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::services::{activity, review};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyStatsQuery {
    date: Option<String>,
}

pub async fn due_words(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    Query(query): Query<ReviewQuery>,
) -> Response {
    let limit = match query.limit.as_deref().map(str::trim) {
        None | Some("") => state.config().review_default_limit,
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if value > 0 => value,
            _ => {
                return AppError::validation("limit must be a positive integer").into_response()
            }
        },
    };

    match review::select_due_words(state.store(), &learner_id, limit, Utc::now()).await {
        Ok(words) => ok(words),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn mastery(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
) -> Response {
    match review::mastery_summary(state.store(), &learner_id, Utc::now()).await {
        Ok(summary) => ok(summary),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn daily_stats(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    Query(query): Query<DailyStatsQuery>,
) -> Response {
    let date = match query.date.as_deref().map(str::trim) {
        None | Some("") => Utc::now().date_naive(),
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                return AppError::validation("date must be formatted as YYYY-MM-DD")
                    .into_response()
            }
        },
    };

    match activity::daily_stats(state.store(), &learner_id, date).await {
        Ok(stats) => ok(stats),
        Err(err) => AppError::from(err).into_response(),
    }
}
