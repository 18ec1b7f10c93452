use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::response::{ok, AppError};
use crate::routes::read_body;
use crate::services::words::{self, WordEntry};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    words: Vec<WordEntry>,
}

#[derive(Serialize)]
struct RegisterResponse {
    registered: usize,
}

pub async fn register(State(state): State<AppState>, req: Request<Body>) -> Response {
    let body = match read_body(req).await {
        Ok(bytes) => bytes,
        Err(res) => return res,
    };

    let payload: RegisterRequest = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return AppError::validation("words must be an array of {id, word}").into_response()
        }
    };

    match words::register_words(state.store(), &payload.words, Utc::now()).await {
        Ok(registered) => ok(RegisterResponse { registered }),
        Err(err) => AppError::from(err).into_response(),
    }
}
