use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::response::{ok, AppError};
use crate::routes::read_body;
use crate::services::progress::{self, AnswerEvent, AnswerPayload};
use crate::state::AppState;

pub async fn submit_answer(State(state): State<AppState>, req: Request<Body>) -> Response {
    let body = match read_body(req).await {
        Ok(bytes) => bytes,
        Err(res) => return res,
    };

    let payload: AnswerPayload = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            return AppError::validation(format!("invalid answer payload: {err}")).into_response()
        }
    };

    let event = match AnswerEvent::try_from(payload) {
        Ok(event) => event,
        Err(err) => return AppError::from(err).into_response(),
    };

    match progress::record_answer(state.store(), &event, Utc::now()).await {
        Ok(recorded) => ok(recorded),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn get_progress(
    State(state): State<AppState>,
    Path((learner_id, word_id)): Path<(String, String)>,
) -> Response {
    match progress::get_progress(state.store(), &learner_id, &word_id).await {
        Ok(Some(record)) => ok(record),
        Ok(None) => AppError::not_found("no progress recorded for this word").into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
