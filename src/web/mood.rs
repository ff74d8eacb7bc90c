use crate::domain::models::{MoodPayload, MoodRecord};
use crate::engine::MoodSubmission;
use crate::error::EngineError;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

const DEFAULT_HISTORY_DAYS: u32 = 30;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct NotesPayload {
    pub notes: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(history).post(submit))
        .route("/:date/notes", patch(update_notes))
        .with_state(state)
}

async fn submit(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<MoodPayload>,
) -> Result<(StatusCode, Json<MoodSubmission>), EngineError> {
    let submission = state.engine.submit_mood(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn history(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MoodRecord>>, EngineError> {
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    Ok(Json(state.engine.mood_history(user_id, days).await?))
}

async fn update_notes(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(date): Path<NaiveDate>,
    Json(payload): Json<NotesPayload>,
) -> Result<Json<MoodRecord>, EngineError> {
    let record = state.engine.update_mood_notes(user_id, date, payload.notes).await?;
    Ok(Json(record))
}
