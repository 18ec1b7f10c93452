mod health;
mod learners;
mod progress;
mod words;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;

use crate::response::json_error;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .route("/api/progress/answers", post(progress::submit_answer))
        .route(
            "/api/learners/:learnerId/progress/:wordId",
            get(progress::get_progress),
        )
        .route("/api/learners/:learnerId/review", get(learners::due_words))
        .route("/api/learners/:learnerId/mastery", get(learners::mastery))
        .route(
            "/api/learners/:learnerId/daily-stats",
            get(learners::daily_stats),
        )
        .route("/api/words", post(words::register))
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found").into_response()
}

async fn read_body(req: Request<Body>) -> Result<Bytes, Response> {
    axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| {
            json_error(StatusCode::BAD_REQUEST, "BODY_TOO_LARGE", "request body too large")
                .into_response()
        })
}
