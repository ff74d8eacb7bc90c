use crate::domain::models::{Challenge, ChallengeId, WeeklyEnrollment};
use crate::error::EngineError;
use crate::services::ledger::{CompletionOutcome, DailyCompletionRequest, WeeklyDayOutcome};
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Deserialize, Default)]
pub struct WeeklyDayPayload {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(catalog))
        .route("/:id/complete", post(complete_daily))
        .route("/:id/enroll", post(enroll))
        .route("/:id/days", post(complete_day))
        .with_state(state)
}

async fn catalog(
    UserSession(_user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Challenge>>, EngineError> {
    Ok(Json(state.engine.catalog().await?))
}

async fn complete_daily(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(challenge_id): Path<ChallengeId>,
    Json(request): Json<DailyCompletionRequest>,
) -> Result<Json<CompletionOutcome>, EngineError> {
    let outcome = state
        .engine
        .complete_daily_challenge(user_id, challenge_id, request)
        .await?;
    Ok(Json(outcome))
}

async fn enroll(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(challenge_id): Path<ChallengeId>,
) -> Result<(StatusCode, Json<WeeklyEnrollment>), EngineError> {
    let enrollment = state.engine.enroll_weekly_challenge(user_id, challenge_id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

async fn complete_day(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(challenge_id): Path<ChallengeId>,
    Json(payload): Json<WeeklyDayPayload>,
) -> Result<Json<WeeklyDayOutcome>, EngineError> {
    let outcome = state
        .engine
        .complete_weekly_day(user_id, challenge_id, payload.date)
        .await?;
    Ok(Json(outcome))
}
