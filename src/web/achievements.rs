use crate::domain::achievements::AchievementProgress;
use crate::domain::models::AchievementUnlock;
use crate::error::EngineError;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{extract::State, routing::get, Json, Router};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(progress))
        .route("/unlocked", get(unlocked))
        .with_state(state)
}

async fn progress(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AchievementProgress>>, EngineError> {
    Ok(Json(state.engine.achievement_progress(user_id).await?))
}

async fn unlocked(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AchievementUnlock>>, EngineError> {
    Ok(Json(state.engine.unlocked_achievements(user_id).await?))
}
