use crate::domain::models::{ProgressionState, WellnessScore};
use crate::error::EngineError;
use crate::services::insights::MoodInsights;
use crate::services::recommendations::{RankedChallenge, RecommendationRequest};
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ScoreQuery {
    pub window_days: Option<u32>,
}

#[derive(Deserialize)]
pub struct InsightsQuery {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct LatestQuery {
    pub limit: Option<usize>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/score", get(score))
        .route("/insights", get(insights))
        .route("/progression", get(progression))
        .route("/recommendations", get(recommend_latest).post(recommend))
        .with_state(state)
}

async fn score(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<ScoreQuery>,
) -> Result<Json<WellnessScore>, EngineError> {
    Ok(Json(state.engine.compute_score(user_id, query.window_days).await?))
}

/// `null` until the window holds at least one check-in.
async fn insights(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<InsightsQuery>,
) -> Result<Json<Option<MoodInsights>>, EngineError> {
    Ok(Json(state.engine.mood_insights(user_id, query.days).await?))
}

async fn progression(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<ProgressionState>, EngineError> {
    Ok(Json(state.engine.progression(user_id).await?))
}

async fn recommend(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(request): Json<RecommendationRequest>,
) -> Json<Vec<RankedChallenge>> {
    Json(state.engine.recommend(user_id, request).await)
}

async fn recommend_latest(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Vec<RankedChallenge>>, EngineError> {
    Ok(Json(state.engine.recommend_latest(user_id, query.limit).await?))
}
